use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use std::fs;
use std::path::Path;
use waterline::change::change_rasters;
use waterline::clip::{aoi_polygon, clip_file};
use waterline::config::PipelineConfig;
use waterline::ndwi::ndwi_rasters;
use waterline::pipeline::{clip_all, FailurePolicy};
use waterline::projection::Crs;
use waterline::raster::{read_raster, write_raster, Affine, WriteOptions};
use waterline::stats::summarize_water;
use waterline::{DynRaster, GeoReference, Raster};

fn utm_georef() -> GeoReference {
    GeoReference::new(
        Some(Crs::from_epsg(32615).unwrap()),
        Affine::new(10.0, 0.0, 400000.0, 0.0, -10.0, 6230000.0),
    )
}

fn write_band(path: &Path, band: Array2<u16>) {
    write_raster(path, &Raster::from_band(band, utm_georef(), None), &WriteOptions::default())
        .unwrap();
}

#[test]
fn ndwi_change_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = |name: &str| dir.path().join(name);

    // 2016: one water pixel; 2021: three
    write_band(&path("2016/green.tif"), array![[300, 100], [100, 0]]);
    write_band(&path("2016/nir.tif"), array![[100, 300], [300, 0]]);
    write_band(&path("2021/green.tif"), array![[300, 300], [300, 0]]);
    write_band(&path("2021/nir.tif"), array![[100, 100], [100, 0]]);

    let t1 = ndwi_rasters(path("2016/green.tif"), path("2016/nir.tif"), path("ndwi_2016.tif"))
        .unwrap();
    assert_abs_diff_eq!(t1.bands[0][(0, 0)], 0.5, epsilon = 1e-6);
    assert!(t1.bands[0][(1, 1)].is_nan());
    ndwi_rasters(path("2021/green.tif"), path("2021/nir.tif"), path("ndwi_2021.tif")).unwrap();

    let outputs = change_rasters(
        path("ndwi_2016.tif"),
        path("ndwi_2021.tif"),
        path("change.tif"),
        Some(0.5),
    )
    .unwrap();
    assert_eq!(outputs.mask, Some(path("change_thr0.5.tif")));

    let change = read_raster(&outputs.change).unwrap();
    assert_eq!(change.georef(), &utm_georef());
    let change = change.band_as::<f32>(0).unwrap();
    assert_abs_diff_eq!(change[(0, 0)], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(change[(0, 1)], 1.0, epsilon = 1e-6);

    let mask = match read_raster(path("change_thr0.5.tif")).unwrap() {
        DynRaster::U8(mask) => mask,
        other => panic!("mask should be u8, got {other}"),
    };
    assert_eq!(mask.nodata, Some(0.0));
    assert_eq!(mask.bands[0], array![[0u8, 1], [1, 0]]);

    let summary = summarize_water(path("change_thr0.5.tif"), path("stats/summary.csv")).unwrap();
    assert_eq!(summary.water_pixels, 2);
    assert_eq!(summary.pixel_area_m2, 100.0);
    assert_eq!(summary.total_water_area_m2, 200.0);
    let csv = fs::read_to_string(path("stats/summary.csv")).unwrap();
    assert_eq!(
        csv,
        "water_pixels,pixel_area_m2,total_water_area_m2\n2,100.0,200.0\n"
    );
}

#[cfg(feature = "image")]
#[test]
fn quicklook_of_ndwi() {
    let dir = tempfile::tempdir().unwrap();
    write_band(&dir.path().join("g.tif"), array![[10, 20, 30], [40, 50, 60]]);
    write_band(&dir.path().join("n.tif"), array![[60, 50, 40], [30, 20, 10]]);
    ndwi_rasters(
        dir.path().join("g.tif"),
        dir.path().join("n.tif"),
        dir.path().join("ndwi.tif"),
    )
    .unwrap();
    waterline::quicklook::save_quicklook(dir.path().join("ndwi.tif"), dir.path().join("ndwi.png"))
        .unwrap();
    let png = fs::read(dir.path().join("ndwi.png")).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn clip_keeps_type_bands_and_nodata() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stack.tif");
    let output = dir.path().join("clipped/stack.tif");
    let georef = GeoReference::new(
        Some(Crs::wgs84()),
        Affine::new(0.05, 0.0, -95.01, 0.0, -0.05, 56.51),
    );
    let raster = Raster::new(
        vec![
            Array2::from_elem((20, 20), 7i16),
            Array2::from_elem((20, 20), -7i16),
        ],
        georef,
        Some(-9999.0),
    )
    .unwrap();
    write_raster(&input, &raster, &WriteOptions::default()).unwrap();

    let aoi = aoi_polygon(&waterline::config::DEFAULT_AOI).unwrap();
    clip_file(&input, &output, &aoi).unwrap();

    let clipped = match read_raster(&output).unwrap() {
        DynRaster::I16(r) => r,
        other => panic!("expected i16, got {other}"),
    };
    assert_eq!(clipped.band_count(), 2);
    assert_eq!(clipped.nodata, Some(-9999.0));
    // AOI spans lon -94.799..-94.30, lat 56.05..56.32
    assert_eq!(clipped.shape(), (7, 11));
    assert_abs_diff_eq!(clipped.transform().c, -94.81, epsilon = 1e-9);
    assert_abs_diff_eq!(clipped.transform().f, 56.36, epsilon = 1e-9);

    // Edge rows and the last column have centres outside the AOI
    let band = &clipped.bands[0];
    assert_eq!(band[(0, 0)], -9999);
    assert_eq!(band[(6, 5)], -9999);
    assert_eq!(band[(3, 10)], -9999);
    assert_eq!(band[(1, 0)], 7);
    assert_eq!(band.iter().filter(|v| **v == 7).count(), 50);
    assert_eq!(clipped.bands[1].iter().filter(|v| **v == -7).count(), 50);
}

#[test]
fn clip_all_mirrors_scene_folders() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig {
        clipped_dir: dir.path().join("clipped"),
        ..Default::default()
    };
    config.landsat.raw_dir = dir.path().join("raw/landsat");
    config.sentinel.raw_dir = dir.path().join("raw/sentinel");

    let scene = "LC08_L2SP_034020_20160711_20200905_02_T1";
    let georef = GeoReference::new(
        Some(Crs::wgs84()),
        Affine::new(0.05, 0.0, -95.0, 0.0, -0.05, 56.5),
    );
    for band in ["SR_B3", "SR_B5", "SR_B4"] {
        let raster = Raster::from_band(Array2::from_elem((20, 20), 1u16), georef, Some(0.0));
        let path = config
            .landsat
            .raw_dir
            .join(scene)
            .join(format!("{scene}_{band}.TIF"));
        write_raster(&path, &raster, &WriteOptions::default()).unwrap();
    }

    let report = clip_all(
        &config,
        &waterline::config::Sensor::ALL,
        FailurePolicy::Stop,
    )
    .unwrap();
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);
    let out = dir.path().join("clipped/landsat").join(scene);
    assert!(out.join(format!("{scene}_SR_B3.tif")).is_file());
    assert!(out.join(format!("{scene}_SR_B5.tif")).is_file());
    assert!(!out.join(format!("{scene}_SR_B4.tif")).exists());
}
