//! Batch drivers over the configured sensors: clip pre-downloaded scenes to
//! the AOI, or fetch scenes from the archives.

use crate::acquire::{
    resolve_credentials, AcquireError, BulkDownloader, CommandDownloader, SecretProvider,
};
use crate::clip::{aoi_polygon, clip_file, describe_aoi, ClipError};
use crate::config::{PipelineConfig, Sensor};
use crate::error::{WaterlineError, WaterlineResult};
use crate::raster::RasterError;
use crate::report::BatchReport;
use geo::Polygon;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::*;
use walkdir::WalkDir;

/// What a batch does when one item fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    Stop,
    KeepGoing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireMethod {
    Http,
    Command,
}

/// Files under `root` whose name matches any pattern, in walk order.
/// Matching is case sensitive.
pub fn find_files(root: &Path, patterns: &[Pattern]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            patterns.iter().any(|pattern| pattern.matches(&name))
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Mirrors `file` from under `root` to under `out_root`, with a `.tif` extension.
pub fn mirrored_output(root: &Path, out_root: &Path, file: &Path) -> PathBuf {
    let relative = file.strip_prefix(root).unwrap_or(file);
    out_root.join(relative).with_extension("tif")
}

fn clip_one(infile: &Path, outfile: &Path, aoi: &Polygon<f64>) -> Result<(), ClipError> {
    let is_jp2 = infile
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jp2"));
    if is_jp2 {
        return Err(RasterError::NotSupported("JPEG 2000 input".into()).into());
    }
    clip_file(infile, outfile, aoi)
}

/// Clips every matching raster under `root` into `out_root`.
///
/// A missing `root` is logged and yields an empty report.
pub fn clip_sensor(
    root: &Path,
    out_root: &Path,
    patterns: &[String],
    aoi: &Polygon<f64>,
    policy: FailurePolicy,
) -> WaterlineResult<BatchReport> {
    let mut report = BatchReport::new(format!("clip {}", root.display()));
    if !root.is_dir() {
        warn!("Input root not found: {}", root.display());
        return Ok(report);
    }

    let patterns = patterns
        .iter()
        .map(|pattern| Pattern::new(pattern))
        .collect::<Result<Vec<_>, _>>()?;
    let files = find_files(root, &patterns);
    info!(
        "Clipping {} file(s) under {} to {}",
        files.len(),
        root.display(),
        out_root.display()
    );
    for infile in files {
        let outfile = mirrored_output(root, out_root, &infile);
        let id = infile.display().to_string();
        match clip_one(&infile, &outfile, aoi) {
            Ok(()) => report.record_success(id, vec![outfile]),
            Err(source) => match policy {
                FailurePolicy::KeepGoing => report.record_failure(id, source),
                FailurePolicy::Stop => {
                    return Err(WaterlineError::ClipFile {
                        path: infile,
                        source,
                    })
                }
            },
        }
    }
    report.log_summary();
    Ok(report)
}

/// Clips the raw scenes of each sensor into `clipped_dir/<sensor>`.
pub fn clip_all(
    config: &PipelineConfig,
    sensors: &[Sensor],
    policy: FailurePolicy,
) -> WaterlineResult<BatchReport> {
    let aoi = aoi_polygon(&config.aoi)?;
    debug!("AOI {}", describe_aoi(&aoi));
    let mut report = BatchReport::new("clip");
    for sensor in sensors {
        let settings = config.sensor(*sensor);
        report.extend(clip_sensor(
            &settings.raw_dir,
            &config.clipped_dir_for(*sensor),
            &settings.clip_patterns,
            &aoi,
            policy,
        )?);
    }
    report.log_summary();
    Ok(report)
}

fn downloader(
    config: &PipelineConfig,
    sensor: Sensor,
    method: AcquireMethod,
) -> Result<Box<dyn BulkDownloader>, AcquireError> {
    let settings = config.sensor(sensor);
    match method {
        #[cfg(feature = "http")]
        AcquireMethod::Http => Ok(Box::new(crate::acquire::HttpDownloader::from_config(
            sensor,
            settings,
            config.http_timeout(),
        )?)),
        #[cfg(not(feature = "http"))]
        AcquireMethod::Http => Err(AcquireError::NotSupported(
            "built without the `http` feature".into(),
        )),
        AcquireMethod::Command => {
            let dataset = settings.dataset.clone().ok_or_else(|| {
                AcquireError::NotSupported(format!("no bulk download dataset configured for {sensor}"))
            })?;
            Ok(Box::new(CommandDownloader::new(
                &config.download_command,
                dataset,
            )))
        }
    }
}

/// Downloads each sensor's scene list into its raw directory.
///
/// A missing download tool or unsupported method skips that sensor with an
/// error log; per-scene failures end up in the report.
pub fn acquire(
    config: &PipelineConfig,
    sensors: &[Sensor],
    method: AcquireMethod,
    secrets: &dyn SecretProvider,
) -> WaterlineResult<BatchReport> {
    let mut report = BatchReport::new("acquire");
    for sensor in sensors {
        let settings = config.sensor(*sensor);
        let downloader = match downloader(config, *sensor, method) {
            Ok(downloader) => downloader,
            Err(AcquireError::NotSupported(reason)) => {
                error!("Skipping {sensor} acquisition: {reason}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let credentials = match (method, settings.auth) {
            (AcquireMethod::Http, false) => {
                debug!("{sensor} HTTP downloads are anonymous");
                None
            }
            _ => match resolve_credentials(secrets, &settings.credentials) {
                Ok(credentials) => Some(credentials),
                Err(AcquireError::MissingCredential(key)) if method == AcquireMethod::Http => {
                    debug!("No {key}, downloading anonymously");
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };

        info!(
            "Acquiring {} {sensor} scene(s) into {}",
            settings.scenes.len(),
            settings.raw_dir.display()
        );
        match downloader.bulk_download(&settings.scenes, credentials.as_ref(), &settings.raw_dir) {
            Ok(sensor_report) => {
                sensor_report.log_summary();
                report.extend(sensor_report);
            }
            Err(e @ AcquireError::ToolMissing { .. }) => error!("Skipping {sensor}: {e}"),
            Err(e) => return Err(e.into()),
        }
    }
    report.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::StoreSecrets;
    use crate::projection::Crs;
    use crate::raster::{write_raster, Affine, GeoReference, Raster, WriteOptions};
    use ndarray::Array2;
    use std::fs;

    fn glob_matches(pattern: &str, name: &str) -> bool {
        Pattern::new(pattern).unwrap().matches(name)
    }

    #[test]
    fn test_wildcards() {
        assert!(glob_matches("*B3*.TIF", "LC08_L2SP_034020_20160711_SR_B3.TIF"));
        assert!(glob_matches("*QA_PIXEL*.TIF", "X_QA_PIXEL.TIF"));
        assert!(!glob_matches("*B3*.TIF", "LC08_SR_B3.tif"));
        assert!(glob_matches("*B0?*.tif", "T15XVS_B08_10m.tif"));
        assert!(glob_matches("*", ""));
        assert!(!glob_matches("*B5*", "B4"));
        assert!(glob_matches("a*b*c", "aXbYbc"));
    }

    #[test]
    fn test_find_files_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a/x_B3.TIF", "a/b/y_B3.TIF", "a/x_B3.tif", "z_B4.TIF"] {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"").unwrap();
        }
        let found = find_files(dir.path(), &[Pattern::new("*B3*.TIF").unwrap()]);
        assert_eq!(
            found,
            vec![dir.path().join("a/b/y_B3.TIF"), dir.path().join("a/x_B3.TIF")]
        );
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = clip_sensor(
            dir.path(),
            &dir.path().join("out"),
            &["[".to_string()],
            &aoi(),
            FailurePolicy::KeepGoing,
        );
        assert!(matches!(result, Err(WaterlineError::Pattern(_))));
    }

    #[test]
    fn test_mirrored_output() {
        assert_eq!(
            mirrored_output(
                Path::new("data/raw/landsat"),
                Path::new("out/landsat"),
                Path::new("data/raw/landsat/scene/scene_SR_B3.TIF")
            ),
            PathBuf::from("out/landsat/scene/scene_SR_B3.tif")
        );
    }

    fn write_scene(path: &Path) {
        let raster = Raster::from_band(
            Array2::from_elem((10, 10), 3u16),
            GeoReference::new(
                Some(Crs::wgs84()),
                Affine::new(0.1, 0.0, -94.8, 0.0, -0.1, 56.4),
            ),
            Some(0.0),
        );
        write_raster(path, &raster, &WriteOptions::default()).unwrap();
    }

    fn aoi() -> Polygon<f64> {
        aoi_polygon(&crate::config::DEFAULT_AOI).unwrap()
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let report = clip_sensor(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            &["*.TIF".to_string()],
            &aoi(),
            FailurePolicy::Stop,
        )
        .unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn test_keep_going_records_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("raw");
        write_scene(&root.join("s1/s1_B3.TIF"));
        fs::write(root.join("s1/s1_B5.TIF"), b"not a tiff").unwrap();
        fs::write(root.join("s1/s1_B03.jp2"), b"jp2").unwrap();
        let patterns = vec!["*B3*.TIF".to_string(), "*B5*.TIF".to_string(), "*.jp2".to_string()];

        let out = dir.path().join("clipped");
        let report =
            clip_sensor(&root, &out, &patterns, &aoi(), FailurePolicy::KeepGoing).unwrap();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert!(out.join("s1/s1_B3.tif").is_file());

        let stopped = clip_sensor(&root, &out, &patterns, &aoi(), FailurePolicy::Stop);
        assert!(matches!(stopped, Err(WaterlineError::ClipFile { .. })));
    }

    /// Fails the run if anything asks it for a secret.
    struct NoSecrets;

    impl SecretProvider for NoSecrets {
        fn secret(&self, key: &str, _: &str, _: bool) -> Result<Option<String>, AcquireError> {
            Err(AcquireError::NotSupported(format!("asked for {key}")))
        }
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_anonymous_sensor_never_resolves_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig {
            http_timeout_secs: Some(5),
            ..Default::default()
        };
        for settings in [&mut config.landsat, &mut config.sentinel] {
            settings.raw_dir = dir.path().to_path_buf();
            settings.scenes.truncate(1);
            settings.url_template = "http://127.0.0.1:9/{scene}_{band}.tif".into();
        }

        let report = acquire(&config, &[Sensor::Sentinel], AcquireMethod::Http, &NoSecrets).unwrap();
        assert_eq!(report.failed(), 1);

        let landsat = acquire(&config, &[Sensor::Landsat], AcquireMethod::Http, &NoSecrets);
        assert!(matches!(
            landsat,
            Err(WaterlineError::Acquire(AcquireError::NotSupported(_)))
        ));
    }

    #[test]
    fn test_acquire_skips_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig {
            download_command: "waterline-no-such-tool".into(),
            ..Default::default()
        };
        config.landsat.raw_dir = dir.path().join("landsat");
        let secrets = StoreSecrets(
            [("USGS_USERNAME", "u"), ("USGS_PASSWORD", "p")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        // Sentinel has no dataset for the command method and is skipped too
        let report = acquire(
            &config,
            &Sensor::ALL,
            AcquireMethod::Command,
            &secrets,
        )
        .unwrap();
        assert!(report.is_empty());
    }
}
