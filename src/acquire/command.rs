use super::{AcquireError, BulkDownloader, Credentials};
use crate::report::BatchReport;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use tracing::*;

/// Runs an external bulk download tool once for the whole batch:
/// `<program> download -u USER -p PASS -d DATASET -o OUT ids...`
#[derive(Clone, Debug)]
pub struct CommandDownloader {
    pub program: String,
    pub dataset: String,
}

impl CommandDownloader {
    pub fn new(program: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            dataset: dataset.into(),
        }
    }
}

impl BulkDownloader for CommandDownloader {
    fn bulk_download(
        &self,
        scene_ids: &[String],
        credentials: Option<&Credentials>,
        destination: &Path,
    ) -> Result<BatchReport, AcquireError> {
        let credentials =
            credentials.ok_or_else(|| AcquireError::MissingCredential("credentials".into()))?;
        fs::create_dir_all(destination)?;

        let mut command = Command::new(&self.program);
        command
            .arg("download")
            .arg("-u")
            .arg(&credentials.username)
            .arg("-p")
            .arg(&credentials.password)
            .arg("-d")
            .arg(&self.dataset)
            .arg("-o")
            .arg(destination)
            .args(scene_ids);
        info!(
            "Running {} download -u {} -p *** -d {} -o {} <{} scene(s)>",
            self.program,
            credentials.username,
            self.dataset,
            destination.display(),
            scene_ids.len()
        );

        let status = command.status().map_err(|e| match e.kind() {
            ErrorKind::NotFound => AcquireError::ToolMissing {
                tool: self.program.clone(),
                hint: format!("Install it into the active environment, e.g. `pip install {}`.", self.program),
            },
            _ => AcquireError::Io(e),
        })?;

        let mut report = BatchReport::new(format!("{} {}", self.program, self.dataset));
        for id in scene_ids {
            if status.success() {
                report.record_success(id, vec![destination.to_path_buf()]);
            } else {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none (killed by signal)".into());
                report.record_failure(id, format!("{} exited with code {code}", self.program));
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "user".into(),
            password: "secret".into(),
        }
    }

    fn scenes() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = CommandDownloader::new("waterline-no-such-tool", "landsat_ot_c2_l2");
        let result = downloader.bulk_download(&scenes(), Some(&credentials()), dir.path());
        assert!(matches!(result, Err(AcquireError::ToolMissing { tool, .. }) if tool == "waterline-no-such-tool"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_applies_to_every_scene() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("landsat");

        let ok = CommandDownloader::new("true", "landsat_ot_c2_l2")
            .bulk_download(&scenes(), Some(&credentials()), &out)
            .unwrap();
        assert_eq!((ok.succeeded(), ok.failed()), (2, 0));
        assert!(out.is_dir());

        let failed = CommandDownloader::new("false", "landsat_ot_c2_l2")
            .bulk_download(&scenes(), Some(&credentials()), &out)
            .unwrap();
        assert_eq!((failed.succeeded(), failed.failed()), (0, 2));
        assert_eq!(
            failed.items[0].result,
            Err("false exited with code 1".to_string())
        );
    }

    #[test]
    fn test_credentials_required() {
        let dir = tempfile::tempdir().unwrap();
        let result = CommandDownloader::new("true", "x").bulk_download(&scenes(), None, dir.path());
        assert!(matches!(result, Err(AcquireError::MissingCredential(_))));
    }
}
