use super::{AcquireError, BulkDownloader, Credentials, Scene};
use crate::config::{Sensor, SensorConfig};
use crate::report::BatchReport;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::*;

/// Downloads individual band files over HTTP(S) from a URL template.
#[derive(Clone, Debug)]
pub struct HttpDownloader {
    client: Client,
    sensor: Sensor,
    url_template: String,
    bands: Vec<String>,
    auth: bool,
}

impl HttpDownloader {
    pub fn new(
        sensor: Sensor,
        url_template: impl Into<String>,
        bands: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AcquireError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            sensor,
            url_template: url_template.into(),
            bands,
            auth: true,
        })
    }

    /// Without auth, credentials passed to `bulk_download` are ignored.
    pub fn with_auth(mut self, auth: bool) -> Self {
        self.auth = auth;
        self
    }

    pub fn from_config(
        sensor: Sensor,
        config: &SensorConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, AcquireError> {
        Ok(Self::new(sensor, &config.url_template, config.bands.clone(), timeout)?
            .with_auth(config.auth))
    }

    /// `destination/<scene>/<scene>_<band>.<ext>`, extension taken from the URL.
    pub fn band_path(destination: &Path, scene: &str, band: &str, url: &str) -> PathBuf {
        let ext = url
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && !ext.contains(['?', '#']))
            .unwrap_or("tif");
        destination.join(scene).join(format!("{scene}_{band}.{ext}"))
    }

    fn fetch(
        &self,
        url: &str,
        path: &Path,
        credentials: Option<&Credentials>,
    ) -> Result<u64, AcquireError> {
        let mut request = self.client.get(url);
        if let Some(credentials) = credentials.filter(|_| self.auth) {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        let mut response = request.send()?.error_for_status()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        let bytes = response.copy_to(&mut writer)?;
        writer.flush()?;
        Ok(bytes)
    }

    fn download_scene(
        &self,
        scene: &Scene,
        credentials: Option<&Credentials>,
        destination: &Path,
    ) -> Result<Vec<PathBuf>, String> {
        let mut paths = vec![];
        let mut errors = vec![];
        for band in &self.bands {
            let url = match scene.render(&self.url_template, band) {
                Ok(url) => url,
                Err(e) => {
                    errors.push(format!("{band}: {e}"));
                    continue;
                }
            };
            let path = Self::band_path(destination, scene.id(), band, &url);
            debug!("GET {url}");
            match self.fetch(&url, &path, credentials) {
                Ok(bytes) => {
                    info!("Downloaded {} ({bytes} bytes)", path.display());
                    paths.push(path);
                }
                Err(e) => {
                    warn!("Failed to download {url}: {e}");
                    errors.push(format!("{band}: {e}"));
                }
            }
        }
        if errors.is_empty() {
            Ok(paths)
        } else {
            Err(errors.join("; "))
        }
    }
}

impl BulkDownloader for HttpDownloader {
    fn bulk_download(
        &self,
        scene_ids: &[String],
        credentials: Option<&Credentials>,
        destination: &Path,
    ) -> Result<BatchReport, AcquireError> {
        fs::create_dir_all(destination)?;
        let mut report = BatchReport::new(format!("{} http", self.sensor));
        for id in scene_ids {
            let outcome = Scene::parse(self.sensor, id)
                .map_err(|e| e.to_string())
                .and_then(|scene| self.download_scene(&scene, credentials, destination));
            match outcome {
                Ok(paths) => report.record_success(id, paths),
                Err(reason) => report.record_failure(id, reason),
            }
        }
        Ok(report)
    }
}
