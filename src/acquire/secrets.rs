use super::AcquireError;
use crate::config::CredentialSpec;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::Path;
use tracing::*;

/// Username and password for a data provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A source of named secrets.
///
/// `label` is a human readable name for the secret and `hidden` marks
/// values that must not be echoed.
pub trait SecretProvider {
    fn secret(&self, key: &str, label: &str, hidden: bool) -> Result<Option<String>, AcquireError>;
}

/// Process environment; empty variables count as unset.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn secret(&self, key: &str, _: &str, _: bool) -> Result<Option<String>, AcquireError> {
        Ok(std::env::var(key).ok().filter(|v| !v.is_empty()))
    }
}

/// Interactive terminal prompts.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptSecrets;

impl SecretProvider for PromptSecrets {
    fn secret(&self, _: &str, label: &str, hidden: bool) -> Result<Option<String>, AcquireError> {
        let theme = ColorfulTheme::default();
        let value = if hidden {
            Password::with_theme(&theme).with_prompt(label).interact()?
        } else {
            Input::<String>::with_theme(&theme)
                .with_prompt(label)
                .interact_text()?
                .trim()
                .to_string()
        };
        Ok(Some(value))
    }
}

/// Key/value secret store, usually a YAML mapping on disk.
#[derive(Clone, Debug, Default)]
pub struct StoreSecrets(pub BTreeMap<String, String>);

impl StoreSecrets {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AcquireError> {
        let path = path.as_ref();
        let store: BTreeMap<String, String> = serde_yaml::from_str(&fs::read_to_string(path)?)?;
        debug!("Loaded {} secret(s) from {}", store.len(), path.display());
        Ok(Self(store))
    }
}

impl SecretProvider for StoreSecrets {
    fn secret(&self, key: &str, _: &str, _: bool) -> Result<Option<String>, AcquireError> {
        Ok(self.0.get(key).cloned())
    }
}

/// Asks each provider in turn; the first answer wins.
#[derive(Default)]
pub struct ChainedSecrets(pub Vec<Box<dyn SecretProvider>>);

impl ChainedSecrets {
    pub fn with(mut self, provider: impl SecretProvider + 'static) -> Self {
        self.0.push(Box::new(provider));
        self
    }
}

impl SecretProvider for ChainedSecrets {
    fn secret(&self, key: &str, label: &str, hidden: bool) -> Result<Option<String>, AcquireError> {
        for provider in &self.0 {
            if let Some(value) = provider.secret(key, label, hidden)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

pub fn resolve_credentials(
    provider: &dyn SecretProvider,
    spec: &CredentialSpec,
) -> Result<Credentials, AcquireError> {
    let username = provider
        .secret(
            &spec.username_key,
            &format!("{} username", spec.service),
            false,
        )?
        .ok_or_else(|| AcquireError::MissingCredential(spec.username_key.clone()))?;
    let password = provider
        .secret(
            &spec.password_key,
            &format!("{} password", spec.service),
            true,
        )?
        .ok_or_else(|| AcquireError::MissingCredential(spec.password_key.clone()))?;
    Ok(Credentials { username, password })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(pairs: &[(&str, &str)]) -> StoreSecrets {
        StoreSecrets(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_first_provider_wins() {
        let chain = ChainedSecrets::default()
            .with(store(&[("USGS_USERNAME", "first")]))
            .with(store(&[("USGS_USERNAME", "second"), ("USGS_PASSWORD", "pw")]));
        let credentials = resolve_credentials(&chain, &CredentialSpec::usgs()).unwrap();
        assert_eq!(credentials.username, "first");
        assert_eq!(credentials.password, "pw");
    }

    #[test]
    fn test_missing_secret() {
        let result = resolve_credentials(
            &store(&[("COPERNICUS_USERNAME", "me")]),
            &CredentialSpec::copernicus(),
        );
        assert!(matches!(
            result,
            Err(AcquireError::MissingCredential(key)) if key == "COPERNICUS_PASSWORD"
        ));
    }

    #[test]
    fn test_env_secrets() {
        std::env::set_var("WATERLINE_TEST_SECRET", "value");
        std::env::set_var("WATERLINE_TEST_EMPTY", "");
        let env = EnvSecrets;
        assert_eq!(
            env.secret("WATERLINE_TEST_SECRET", "", false).unwrap().as_deref(),
            Some("value")
        );
        assert_eq!(env.secret("WATERLINE_TEST_EMPTY", "", false).unwrap(), None);
    }

    #[test]
    fn test_store_from_yaml_and_redacted_debug() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.yaml");
        fs::write(&path, "USGS_USERNAME: me\nUSGS_PASSWORD: hunter2\n").unwrap();
        let credentials =
            resolve_credentials(&StoreSecrets::open(&path).unwrap(), &CredentialSpec::usgs())
                .unwrap();
        let debug = format!("{credentials:?}");
        assert!(debug.contains("me"));
        assert!(!debug.contains("hunter2"));
    }
}
