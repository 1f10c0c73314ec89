use crate::readers::SourceFormat;
use crate::utils::CoordinateSystem;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "precip-processor")]
#[command(about = "Per-cell annual and monthly precipitation summaries from gridded and station archives")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the cell registry from source points or a grid table
    BuildRegistry {
        #[arg(short, long, num_args = 1.., help = "Source files or station directories")]
        input: Vec<PathBuf>,

        #[arg(long, help = "Grid table (LAMBX (hm);LAMBY (hm);LAT_DG;LON_DG) used instead of source points")]
        grid: Option<PathBuf>,

        #[arg(short, long, help = "GeoJSON boundary restricting the registry")]
        region: Option<PathBuf>,

        #[arg(short, long, help = "Registry output path [default: centroid_coordinates.json]")]
        output: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Aggregate sources into per-cell JSON reports, one pass per input
    Process {
        #[arg(short, long, num_args = 1.., required = true, help = "Source files or station directories")]
        input: Vec<PathBuf>,

        #[arg(long, help = "Registry path; built from the first pass when missing")]
        registry: Option<PathBuf>,

        #[arg(short, long, help = "Report directory [default: output/cells]")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, help = "GeoJSON boundary used when the registry is built")]
        region: Option<PathBuf>,

        #[arg(long, help = "First day to include (YYYY-MM-DD)")]
        start: Option<NaiveDate>,

        #[arg(long, help = "Last day to include (YYYY-MM-DD)")]
        end: Option<NaiveDate>,

        #[arg(long, help = "Merge into existing reports from the first pass on")]
        append: bool,

        #[arg(long, help = "Files parsed in parallel [default: number of CPUs]")]
        max_workers: Option<usize>,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Summarize the report of the cell nearest to a location
    Info {
        #[arg(long, allow_negative_numbers = true, help = "Longitude (WGS84 degrees)")]
        lon: f64,

        #[arg(long, allow_negative_numbers = true, help = "Latitude (WGS84 degrees)")]
        lat: f64,

        #[arg(short, long, help = "Report directory [default: output/cells]")]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "Registry path [default: centroid_coordinates.json]")]
        registry: Option<PathBuf>,

        #[arg(long, help = "Variable to read from multi-variable reports")]
        variable: Option<String>,

        #[arg(long, help = "Year of the monthly series [default: latest year]")]
        year: Option<String>,

        #[arg(short, long, help = "Configuration file (TOML, YAML or JSON)")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct SourceArgs {
    #[arg(short, long, help = "Configuration file (TOML, YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Coordinate system of the source coordinates")]
    pub crs: Option<CoordinateSystem>,

    #[arg(long, value_enum, default_value_t = SourceFormat::Auto)]
    pub format: SourceFormat,

    #[arg(long = "variable", help = "Variable to summarize (repeatable)")]
    pub variables: Vec<String>,

    #[arg(long, help = "Variable whose negative values count as zero (repeatable)")]
    pub clip_negative: Vec<String>,
}
