use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::*;
use waterline::acquire::{ChainedSecrets, EnvSecrets, PromptSecrets, StoreSecrets};
use waterline::config::{PipelineConfig, Sensor, DEFAULT_CONFIG_PATH};
use waterline::pipeline::{self, AcquireMethod, FailurePolicy};
#[cfg(not(feature = "image"))]
use waterline::raster::RasterError;
use waterline::tiles::{self, TileGrid};
use waterline::{align, change, ndwi, stats, WaterlineResult};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SensorChoice {
    Landsat,
    Sentinel,
    All,
}

impl SensorChoice {
    fn sensors(self) -> Vec<Sensor> {
        match self {
            SensorChoice::Landsat => vec![Sensor::Landsat],
            SensorChoice::Sentinel => vec![Sensor::Sentinel],
            SensorChoice::All => Sensor::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodChoice {
    /// Fetch band files directly from the archive buckets
    Http,
    /// Run the external bulk download tool
    Cli,
}

#[derive(Parser)]
#[command(name = "waterline", version)]
#[command(about = "Surface water mapping from Landsat and Sentinel-2 GeoTIFFs", long_about = None)]
struct Args {
    /// Pipeline config; ignored if the file does not exist
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute NDWI from green and NIR band rasters
    Ndwi {
        /// Green band raster
        #[arg(long)]
        input: PathBuf,
        /// NIR band raster
        #[arg(long)]
        nir: PathBuf,
        /// Output NDWI GeoTIFF
        #[arg(long)]
        out: PathBuf,
    },
    /// Difference two NDWI rasters (t2 - t1)
    ChangeDetect {
        #[arg(long)]
        t1: PathBuf,
        #[arg(long)]
        t2: PathBuf,
        /// Output change GeoTIFF
        #[arg(long)]
        out: PathBuf,
        /// Also write a mask of |change| >= threshold
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Count water pixels in a 0/1 mask and write a CSV summary
    Summarize {
        #[arg(long)]
        mask: PathBuf,
        #[arg(long = "out_csv", alias = "out-csv")]
        out_csv: PathBuf,
    },
    /// Render a stretched grayscale PNG of band 1
    Quicklook {
        #[arg(long)]
        raster: PathBuf,
        #[arg(long = "out_png", alias = "out-png")]
        out_png: PathBuf,
    },
    /// Clip downloaded scenes to the AOI
    Clip {
        #[arg(long, value_enum, default_value = "all")]
        sensor: SensorChoice,
        /// Record failures and continue instead of stopping
        #[arg(long)]
        keep_going: bool,
    },
    /// Download the configured scenes
    Acquire {
        #[arg(long, value_enum, default_value = "all")]
        sensor: SensorChoice,
        #[arg(long, value_enum, default_value = "http")]
        method: MethodChoice,
    },
    /// List grid tiles intersecting the AOI geometries of a KML file
    Tiles {
        #[arg(long)]
        kml: PathBuf,
        /// Tiling grid GeoJSON
        #[arg(long)]
        grid: PathBuf,
        /// Property column(s) forming the tile id, e.g. PATH ROW
        #[arg(long = "id-column", num_args = 1.., default_value = "Name")]
        id_columns: Vec<String>,
    },
    /// Resample a raster onto the grid of a reference raster
    Align {
        #[arg(long)]
        src: PathBuf,
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print the TIFF and GeoTIFF structure of a file
    Info { path: PathBuf },
}

#[cfg(feature = "image")]
fn quicklook(raster: &Path, out_png: &Path) -> WaterlineResult<()> {
    Ok(waterline::quicklook::save_quicklook(raster, out_png)?)
}

#[cfg(not(feature = "image"))]
fn quicklook(_: &Path, _: &Path) -> WaterlineResult<()> {
    Err(RasterError::NotSupported("quicklooks need the `image` feature".into()).into())
}

fn run(args: Args) -> WaterlineResult<()> {
    match args.command {
        Command::Ndwi { input, nir, out } => {
            ndwi::ndwi_rasters(&input, &nir, &out)?;
            println!("Saved NDWI to {}", out.display());
        }
        Command::ChangeDetect {
            t1,
            t2,
            out,
            threshold,
        } => {
            let outputs = change::change_rasters(&t1, &t2, &out, threshold)?;
            println!("Saved change map to {}", outputs.change.display());
            if let Some(mask) = outputs.mask {
                println!("Saved change mask to {}", mask.display());
            }
        }
        Command::Summarize { mask, out_csv } => {
            stats::summarize_water(&mask, &out_csv)?;
            println!("Saved stats to {}", out_csv.display());
        }
        Command::Quicklook { raster, out_png } => {
            quicklook(&raster, &out_png)?;
            println!("Saved preview to {}", out_png.display());
        }
        Command::Clip { sensor, keep_going } => {
            let config = PipelineConfig::load_or_default(&args.config)?;
            let policy = if keep_going {
                FailurePolicy::KeepGoing
            } else {
                FailurePolicy::Stop
            };
            let report = pipeline::clip_all(&config, &sensor.sensors(), policy)?;
            println!("{report}");
        }
        Command::Acquire { sensor, method } => {
            let config = PipelineConfig::load_or_default(&args.config)?;
            let mut secrets = ChainedSecrets::default().with(EnvSecrets);
            if let Some(path) = &config.secrets_file {
                secrets = secrets.with(StoreSecrets::open(path)?);
            }
            let secrets = secrets.with(PromptSecrets);
            let method = match method {
                MethodChoice::Http => AcquireMethod::Http,
                MethodChoice::Cli => AcquireMethod::Command,
            };
            let report = pipeline::acquire(&config, &sensor.sensors(), method, &secrets)?;
            println!("{report}");
        }
        Command::Tiles {
            kml,
            grid,
            id_columns,
        } => {
            let aoi = tiles::load_kml(&kml)?;
            let grid = TileGrid::open(&grid)?;
            for id in tiles::match_tiles(&aoi, &grid, &id_columns) {
                println!("{id}");
            }
        }
        Command::Align {
            src,
            reference,
            out,
        } => {
            align::align_file(&src, &reference, &out)?;
            println!("Saved aligned raster to {}", out.display());
        }
        Command::Info { path } => {
            let reader = &mut BufReader::new(File::open(&path)?);
            print!("{}", waterline::disect(reader)?);
        }
    }
    Ok(())
}

fn main() -> WaterlineResult<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .init();

    run(args).inspect_err(|e| error!("{e}"))
}
