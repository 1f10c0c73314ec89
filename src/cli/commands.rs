use crate::analyzers::ReportAnalyzer;
use crate::cli::args::{Cli, Commands, SourceArgs};
use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::SourceBatch;
use crate::processors::{CellRegistry, Pipeline, Region};
use crate::readers::{read_region, GridReader, SourceReader};
use crate::utils::progress::ProgressReporter;
use crate::writers::JsonCellStore;
use std::fs::File;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, Level};

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::BuildRegistry {
            input,
            grid,
            region,
            output,
            source,
        } => {
            let mut config = load_config(&source)?;
            if grid.is_some() {
                config.grid_path = grid;
            }
            if region.is_some() {
                config.region_path = region;
            }
            if let Some(output) = output {
                config.registry_path = output;
            }
            let config = config.validated()?;

            if input.is_empty() && config.grid_path.is_none() {
                return Err(ProcessingError::Config(
                    "build-registry needs --input files or a --grid table".to_string(),
                ));
            }

            println!("Building cell registry...");
            let reader = SourceReader::from_config(&config).with_format(source.format);
            let progress = ProgressReporter::new_spinner("Reading sources...", quiet());

            let mut points = SourceBatch::new();
            if config.grid_path.is_none() {
                for path in sorted(&input) {
                    progress.set_message(&format!("Reading {}", path.display()));
                    points.extend(reader.read_pass(&path)?);
                }
            }

            let registry = build_registry(&config, &points)?;
            registry.save(&config.registry_path)?;
            progress.finish_with_message(&format!("Registry holds {} cells", registry.len()));

            println!(
                "Saved {} cells ({}) to {}",
                registry.len(),
                registry.system(),
                config.registry_path.display()
            );
        }

        Commands::Process {
            input,
            registry,
            output_dir,
            region,
            start,
            end,
            append,
            max_workers,
            source,
        } => {
            let mut config = load_config(&source)?;
            if let Some(registry) = registry {
                config.registry_path = registry;
            }
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if region.is_some() {
                config.region_path = region;
            }
            if start.is_some() {
                config.start_date = start;
            }
            if end.is_some() {
                config.end_date = end;
            }
            if let Some(max_workers) = max_workers {
                config.max_workers = max_workers;
            }
            let config = config.validated()?;

            let inputs = sorted(&input);
            println!("Processing {} pass(es)...", inputs.len());
            println!("Output directory: {}", config.output_dir.display());
            println!(
                "Variables: {}, workers: {}",
                config.variables.join(", "),
                config.max_workers
            );

            let reader = SourceReader::from_config(&config).with_format(source.format);

            // The first pass is read up front when the registry must be built from it
            let mut first_batch = None;
            let registry = if config.registry_path.is_file() {
                CellRegistry::load(
                    &config.registry_path,
                    config.source_crs,
                    config.coordinate_precision,
                )?
            } else {
                let batch = match config.grid_path {
                    Some(_) => SourceBatch::new(),
                    None => reader.read_pass(&inputs[0])?,
                };
                let registry = build_registry(&config, &batch)?;
                registry.save(&config.registry_path)?;
                if config.grid_path.is_none() {
                    first_batch = Some(batch);
                }
                registry
            };

            if registry.is_empty() {
                return Err(ProcessingError::Config(
                    "Registry holds no cells; check the region and the source coordinates"
                        .to_string(),
                ));
            }

            let store = JsonCellStore::new(&config.output_dir)?;
            let pipeline = Pipeline::new(&config, &registry, &store)?;
            let progress = ProgressReporter::new(registry.len() as u64, "Writing reports", quiet());

            let batches = inputs.iter().enumerate().map(|(index, path)| {
                match (index, first_batch.take()) {
                    (0, Some(batch)) => Ok(batch),
                    _ => {
                        info!("Reading pass {} from {}", index, path.display());
                        reader.read_pass(path)
                    }
                }
            });

            let summary = pipeline.run(batches, append, &progress)?;
            progress.finish_with_message("Processing complete");

            println!("\n{}", summary.generate_summary());
            if summary.cells_skipped() > 0 {
                println!(
                    "⚠️  {} cell(s) skipped; rerun without --append to write them first",
                    summary.cells_skipped()
                );
            }
        }

        Commands::Info {
            lon,
            lat,
            output_dir,
            registry,
            variable,
            year,
            config,
        } => {
            let mut settings = PipelineConfig::load(config.as_deref())?;
            if let Some(output_dir) = output_dir {
                settings.output_dir = output_dir;
            }
            if let Some(registry) = registry {
                settings.registry_path = registry;
            }

            if !settings.output_dir.is_dir() {
                return Err(ProcessingError::Config(format!(
                    "Report directory not found: {}",
                    settings.output_dir.display()
                )));
            }

            let registry = CellRegistry::open(&settings.registry_path)?;
            let store = JsonCellStore::new(&settings.output_dir)?;

            let analyzer = variable.map(ReportAnalyzer::for_variable).unwrap_or_default();
            let insight = analyzer.analyze_nearest(&registry, &store, lon, lat, year.as_deref())?;

            println!("{}", insight.detailed_summary());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let installed = match log_file {
        Some(path) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(File::create(path)?))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| ProcessingError::Config(format!("Cannot initialize logging: {}", e)))
}

fn load_config(source: &SourceArgs) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(source.config.as_deref())?;
    if let Some(crs) = source.crs {
        config.source_crs = crs;
    }
    if !source.variables.is_empty() {
        config.variables = source.variables.clone();
    }
    if !source.clip_negative.is_empty() {
        config.clip_negative = source.clip_negative.clone();
    }
    Ok(config)
}

/// Registry from the configured grid table, or from the points of `batch`
fn build_registry(config: &PipelineConfig, batch: &SourceBatch) -> Result<CellRegistry> {
    let region: Option<Region> = config.region_path.as_deref().map(read_region).transpose()?;

    let registry = match (&config.grid_path, &region) {
        (Some(grid), region) => CellRegistry::from_grid_table(
            GridReader::new().read_file(grid)?,
            config.source_crs,
            config.coordinate_precision,
            region.as_ref(),
        )?,
        (None, Some(region)) => CellRegistry::from_points_in_region(
            batch.points.iter().copied(),
            config.source_crs,
            config.coordinate_precision,
            region,
        )?,
        (None, None) => CellRegistry::from_points(
            batch.points.iter().copied(),
            config.source_crs,
            config.coordinate_precision,
        )?,
    };

    info!(
        "Built registry of {} cells from {}",
        registry.len(),
        if config.grid_path.is_some() { "grid table" } else { "source points" }
    );
    Ok(registry)
}

fn sorted(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut paths = paths.to_vec();
    paths.sort();
    paths
}

fn quiet() -> bool {
    !std::io::stderr().is_terminal()
}
