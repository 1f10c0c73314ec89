use chrono::NaiveDate;
use precip_processor::analyzers::ReportAnalyzer;
use precip_processor::config::PipelineConfig;
use precip_processor::models::{CellId, CellReport, Measurement, PeriodValue, ReportShape};
use precip_processor::processors::{CellRegistry, Pipeline, RunSummary, TemporalAggregator};
use precip_processor::readers::{read_region, SourceReader};
use precip_processor::utils::{CoordinateSystem, ProgressReporter};
use precip_processor::writers::{CellStore, JsonCellStore};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FIRST_PASS: &str = "\
LAMBX;LAMBY;DATE;PRELIQ_Q
1.0;45.0;20200115;5.0
1.0;45.0;20200120;3.0
1.0;45.0;20200201;2.0
1.0;45.0;20210301;4.0
2.0;46.0;20200601;1.5
2.0;46.0;20210602;2.5
2.0;46.0;20210701;0.5
5.0;45.0;20200101;9.0
5.0;45.0;20200102;9.0
5.0;45.0;20210101;9.0
";

const SECOND_PASS: &str = "\
LAMBX;LAMBY;DATE;PRELIQ_Q
1.0;45.0;20210302;100.0
1.0;45.0;20220105;6.0
2.0;46.0;20220110;not-a-number
2.0;46.0;20220111;1.0
";

fn write_region(dir: &Path) -> PathBuf {
    let path = dir.join("region.geojson");
    let region = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "west"},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 40.0], [3.0, 40.0], [3.0, 50.0], [0.0, 50.0], [0.0, 40.0]]]
            }
        }]
    });
    fs::write(&path, region.to_string()).unwrap();
    path
}

fn write_source(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn config_for(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: dir.join("cells"),
        registry_path: dir.join("registry.json"),
        region_path: Some(write_region(dir)),
        max_workers: 2,
        ..PipelineConfig::default()
    }
}

fn build_registry(config: &PipelineConfig, first_input: &Path) -> CellRegistry {
    let batch = SourceReader::from_config(config).read_pass(first_input).unwrap();
    let region = read_region(config.region_path.as_deref().unwrap()).unwrap();
    CellRegistry::from_points_in_region(
        batch.points,
        config.source_crs,
        config.coordinate_precision,
        &region,
    )
    .unwrap()
}

fn run_passes(
    config: &PipelineConfig,
    registry: &CellRegistry,
    inputs: &[PathBuf],
    append: bool,
) -> RunSummary {
    let store = JsonCellStore::new(&config.output_dir).unwrap();
    let reader = SourceReader::from_config(config);
    let pipeline = Pipeline::new(config, registry, &store).unwrap();
    pipeline
        .run(
            inputs.iter().map(|path| reader.read_pass(path)),
            append,
            &ProgressReporter::silent(),
        )
        .unwrap()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn report_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_end_to_end_region_restricts_reports() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config = config_for(temp_dir.path());
    let input = write_source(temp_dir.path(), "2020.csv", FIRST_PASS);

    let registry = build_registry(&config, &input);
    assert_eq!(registry.len(), 2);

    let summary = run_passes(&config, &registry, &[input], false);

    assert_eq!(report_files(&config.output_dir), vec!["1.json", "2.json"]);
    assert_eq!(summary.cells_written, 2);
    assert_eq!(summary.join_misses, 3);
    assert_eq!(summary.records_aggregated, 7);

    assert_eq!(
        read_json(&config.output_dir.join("1.json")),
        json!({
            "years": {"2020": 10.0, "2021": 4.0},
            "months": {"2020-01": 8.0, "2020-02": 2.0, "2021-03": 4.0}
        })
    );
    assert_eq!(
        read_json(&config.output_dir.join("2.json")),
        json!({
            "years": {"2020": 1.5, "2021": 3.0},
            "months": {"2020-06": 1.5, "2021-06": 2.5, "2021-07": 0.5}
        })
    );
}

#[test]
fn test_second_pass_merges_without_overwriting() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path());
    let first = write_source(temp_dir.path(), "2020.csv", FIRST_PASS);
    let second = write_source(temp_dir.path(), "2022.csv", SECOND_PASS);

    let registry = build_registry(&config, &first);
    let summary = run_passes(&config, &registry, &[first, second], false);

    let report = read_json(&config.output_dir.join("1.json"));
    // 2021 and 2021-03 were written by the first pass and are kept
    assert_eq!(report["years"]["2021"], json!(4.0));
    assert_eq!(report["months"]["2021-03"], json!(4.0));
    assert_eq!(report["years"]["2022"], json!(6.0));
    assert_eq!(report["months"]["2022-01"], json!(6.0));

    let other = read_json(&config.output_dir.join("2.json"));
    assert_eq!(other["years"]["2022"], json!(1.0));

    assert_eq!(summary.passes, 2);
    assert_eq!(summary.records_dropped, 1);
    assert_eq!(summary.cells_merged, 2);
    assert_eq!(summary.cells_skipped(), 0);
}

#[test]
fn test_rerun_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path());
    let first = write_source(temp_dir.path(), "2020.csv", FIRST_PASS);
    let second = write_source(temp_dir.path(), "2022.csv", SECOND_PASS);
    let inputs = vec![first.clone(), second];

    let registry = build_registry(&config, &first);
    run_passes(&config, &registry, &inputs, false);
    let before: Vec<Vec<u8>> = ["1.json", "2.json"]
        .iter()
        .map(|name| fs::read(config.output_dir.join(name)).unwrap())
        .collect();

    // Full rerun from scratch on the same inputs
    let rebuilt = build_registry(&config, &first);
    assert_eq!(rebuilt.cells(), registry.cells());
    run_passes(&config, &rebuilt, &inputs, false);
    let after: Vec<Vec<u8>> = ["1.json", "2.json"]
        .iter()
        .map(|name| fs::read(config.output_dir.join(name)).unwrap())
        .collect();

    assert_eq!(before, after);
}

#[test]
fn test_append_run_reports_missing_targets_and_continues() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path());
    let first = write_source(temp_dir.path(), "2020.csv", FIRST_PASS);
    let second = write_source(temp_dir.path(), "2022.csv", SECOND_PASS);

    let registry = build_registry(&config, &first);
    run_passes(&config, &registry, &[first], false);
    fs::remove_file(config.output_dir.join("2.json")).unwrap();

    let summary = run_passes(&config, &registry, &[second], true);

    assert_eq!(summary.cells_merged, 1);
    assert_eq!(summary.cells_skipped(), 1);
    assert_eq!(summary.skipped[0].cell_id, CellId::new(2).unwrap());
    assert!(!config.output_dir.join("2.json").exists());
    assert_eq!(read_json(&config.output_dir.join("1.json"))["years"]["2022"], json!(6.0));
}

#[test]
fn test_persisted_registry_keeps_ids_stable() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(temp_dir.path());
    let first = write_source(temp_dir.path(), "2020.csv", FIRST_PASS);

    let registry = build_registry(&config, &first);
    registry.save(&config.registry_path).unwrap();

    // A later source lists the cells in another order and adds a new one
    let reordered = write_source(
        temp_dir.path(),
        "reordered.csv",
        "LAMBX;LAMBY;DATE;PRELIQ_Q\n0.5;41.0;20230101;1.0\n2.0;46.0;20230101;1.0\n1.0;45.0;20230101;1.0\n",
    );
    let loaded =
        CellRegistry::load(&config.registry_path, CoordinateSystem::Geographic, 3).unwrap();
    assert_eq!(loaded.cells(), registry.cells());
    assert_eq!(loaded.lookup_exact(1.0, 45.0), CellId::new(1));
    assert_eq!(loaded.lookup_exact(2.0, 46.0), CellId::new(2));

    let summary = run_passes(&config, &loaded, &[reordered], false);
    // The unknown point is a join miss, not a new id
    assert_eq!(summary.join_misses, 1);
    assert_eq!(report_files(&config.output_dir), vec!["1.json", "2.json"]);
}

#[test]
fn test_station_directory_is_one_pass() {
    let temp_dir = TempDir::new().unwrap();
    let stations = temp_dir.path().join("stations");
    fs::create_dir_all(&stations).unwrap();
    fs::write(
        stations.join("Q_31_069001.csv"),
        b"# NOM_USUEL=TOULOUSE-BLAGNAC\n# LATITUDE (\xb0)=43,621\n# LONGITUDE(\xb0)=1,379\n# ALTITUDE (m)=151\ndate;precipitation;quality\n20230101;2,5;1\n20230215;4,0;1\n",
    )
    .unwrap();
    fs::write(
        stations.join("Q_75_114001.csv"),
        "# NOM_USUEL=PARIS-MONTSOURIS\n# LATITUDE (°)=48.8217\n# LONGITUDE(°)=2.3378\ndate;precipitation;quality\n20230101;1.0;1\n20230102;;0\n",
    )
    .unwrap();

    let config = PipelineConfig {
        output_dir: temp_dir.path().join("cells"),
        variables: vec!["precipitation".to_string()],
        ..PipelineConfig::default()
    };
    let batch = SourceReader::from_config(&config).read_pass(&stations).unwrap();
    let registry = CellRegistry::from_points(batch.points.clone(), config.source_crs, 3).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.cells()[0].elevation, Some(151.0));

    let summary = run_passes(&config, &registry, &[stations], false);
    assert_eq!(summary.cells_written, 2);

    let store = JsonCellStore::new(&config.output_dir).unwrap();
    let toulouse = store.read(CellId::new(1).unwrap()).unwrap();
    assert_eq!(toulouse.years["2023"], PeriodValue::Scalar(6.5));
    assert_eq!(toulouse.months["2023-02"], PeriodValue::Scalar(4.0));

    let insight = ReportAnalyzer::new()
        .analyze_nearest(&registry, &store, 2.35, 48.85, None)
        .unwrap();
    assert_eq!(insight.cell.id, CellId::new(2).unwrap());
    assert_eq!(insight.statistics.wettest.map(|t| t.total), Some(1.0));
}

#[test]
fn test_lambert_source_with_two_variables() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_source(
        temp_dir.path(),
        "QUOT_SIM2.csv",
        "LAMBX;LAMBY;DATE;PRELIQ_Q;PE_Q\n\
         6020;24300;20230101;2.0;-1.5\n\
         6020;24300;20230102;3.0;2.0\n\
         6100;24300;20230101;1.0;1.0\n",
    );
    let config = PipelineConfig {
        output_dir: temp_dir.path().join("cells"),
        source_crs: CoordinateSystem::LambertIiExtended,
        variables: vec!["PRELIQ_Q".to_string(), "PE_Q".to_string()],
        clip_negative: vec!["PE_Q".to_string()],
        prefix_labels: true,
        ..PipelineConfig::default()
    }
    .validated()
    .unwrap();

    let batch = SourceReader::from_config(&config).read_pass(&input).unwrap();
    let registry =
        CellRegistry::from_points(batch.points, config.source_crs, config.coordinate_precision)
            .unwrap();
    let paris = &registry.cells()[0];
    assert!((paris.lat - 48.868).abs() < 0.01);

    run_passes(&config, &registry, &[input], false);

    assert_eq!(
        read_json(&config.output_dir.join("1.json")),
        json!({
            "years": {"2023": {"annual_PE_Q": 2.0, "annual_PRELIQ_Q": 5.0}},
            "months": {"2023-01": {"monthly_PE_Q": 2.0, "monthly_PRELIQ_Q": 5.0}}
        })
    );
}

#[test]
fn test_aggregation_examples() {
    let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
    let rain = |date, value| Measurement::new(1.0, 45.0, date).with_value("PRELIQ_Q", value);
    let shape = ReportShape::for_variables(&["PRELIQ_Q".to_string()], false).unwrap();

    let data = vec![
        rain(day(2020, 1, 15), 5.0),
        rain(day(2020, 1, 20), 3.0),
        rain(day(2020, 2, 1), 2.0),
    ];
    let report = TemporalAggregator::new(vec!["PRELIQ_Q".to_string()])
        .aggregate(&data)
        .into_report(&shape);
    assert_eq!(report.years["2020"], PeriodValue::Scalar(10.0));
    assert_eq!(report.months["2020-01"], PeriodValue::Scalar(8.0));
    assert_eq!(report.months["2020-02"], PeriodValue::Scalar(2.0));

    let clipped = vec![
        rain(day(2020, 3, 1), -3.0),
        rain(day(2020, 3, 2), 4.0),
        rain(day(2020, 3, 3), -1.0),
    ];
    let report = TemporalAggregator::new(vec!["PRELIQ_Q".to_string()])
        .with_clip_negative(["PRELIQ_Q"])
        .aggregate(&clipped)
        .into_report(&shape);
    assert_eq!(report.years["2020"], PeriodValue::Scalar(4.0));
}

#[test]
fn test_merge_additivity_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonCellStore::new(temp_dir.path()).unwrap();
    let id = CellId::new(9).unwrap();

    let a: CellReport =
        serde_json::from_value(json!({"years": {"2020": 10.0}, "months": {"2020-01": 10.0}}))
            .unwrap();
    let b: CellReport =
        serde_json::from_value(json!({"years": {"2021": 3.0}, "months": {"2021-05": 3.0}}))
            .unwrap();

    store.write(id, &a).unwrap();
    let merged = store.merge(id, &b).unwrap();
    assert_eq!(
        serde_json::to_value(&merged).unwrap(),
        json!({
            "years": {"2020": 10.0, "2021": 3.0},
            "months": {"2020-01": 10.0, "2021-05": 3.0}
        })
    );

    let bytes = fs::read(store.path_for(id)).unwrap();
    store.merge(id, &a).unwrap();
    assert_eq!(fs::read(store.path_for(id)).unwrap(), bytes);
}
