use std::fs;
use std::path::Path;

use assert_matches::assert_matches;

use cif_shift_augment::catalog::PREDICTOR_IDS;
use cif_shift_augment::config::{ConfigLoader, ConfigValue, RunSettings};
use cif_shift_augment::error::AugmentError;
use cif_shift_augment::predictions::REQUIRED_QUERIES;
use cif_shift_augment::query::{DatabaseSettings, PgQueryRunner, QueryTemplate, validate_queries};

const MAIN_CFG: &str = "\
[configs]
db = databases/db.cfg
queries = queries.cfg

[augment]
chain = A
";

const DB_CFG: &str = "\
[csp]
dbname = csp
host = db.example.org
host_local = localhost
username = reader
port = 5433
";

const QUERIES_CFG: &str = "\
# selects shifts of one predictor
[Q_compareCSP]
database = csp
query = SELECT res_sequence, atom, chemical_shift
    FROM shifts
    WHERE af_id = %%%AFID%%% AND csp_id = %%%CSPID%%%
header = res_sequence & atom & chemical_shift

[Q_select_pdbAtoms]
database = csp
query = SELECT * FROM atoms
";

fn write_tree(root: &Path) -> std::path::PathBuf {
    fs::create_dir_all(root.join("databases")).unwrap();
    fs::write(root.join("databases").join("db.cfg"), DB_CFG).unwrap();
    fs::write(root.join("queries.cfg"), QUERIES_CFG).unwrap();
    let main = root.join("main.cfg");
    fs::write(&main, MAIN_CFG).unwrap();
    main
}

#[test]
fn nested_configs_resolve_relative_to_including_file() {
    let temp = tempfile::tempdir().unwrap();
    let config = ConfigLoader::default().load(&write_tree(temp.path())).unwrap();

    assert_eq!(
        config.keys().collect::<Vec<_>>(),
        vec!["db", "queries", "augment"]
    );
    assert_eq!(
        config.value(&["db", "csp", "host"]),
        Some(&ConfigValue::Str("db.example.org".to_string()))
    );
    assert_eq!(
        config.value(&["db", "csp", "port"]),
        Some(&ConfigValue::Int(5433))
    );
}

#[test]
fn sections_are_found_depth_first() {
    let temp = tempfile::tempdir().unwrap();
    let config = ConfigLoader::default().load(&write_tree(temp.path())).unwrap();

    assert!(config.find_section("augment").is_some());
    assert!(config.find_section("Q_select_pdbAtoms").is_some());
    assert!(config.find_section("Q_missing").is_none());

    let template = QueryTemplate::from_config(&config, "compareCSP").unwrap();
    assert_eq!(template.database, "csp");
    assert_eq!(
        template.query,
        "SELECT res_sequence, atom, chemical_shift\nFROM shifts\nWHERE af_id = %%%AFID%%% AND csp_id = %%%CSPID%%%"
    );
    assert_eq!(
        template.header,
        Some(vec![
            "res_sequence".to_string(),
            "atom".to_string(),
            "chemical_shift".to_string()
        ])
    );

    let db = DatabaseSettings::from_config(&config, &template.database).unwrap();
    assert_eq!(db.host, "db.example.org");
    assert_eq!(db.host_local, "localhost");
    assert_eq!(db.port, Some(5433));
}

#[test]
fn unknown_query_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let config = ConfigLoader::default().load(&write_tree(temp.path())).unwrap();

    let err = QueryTemplate::from_config(&config, "afID_Index").unwrap_err();
    assert!(err.is_fatal());
    assert_matches!(err, AugmentError::QueryNotFound(name) if name == "Q_afID_Index");
}

#[test]
fn missing_section_and_parameter() {
    let loader = ConfigLoader::default();
    let config = loader
        .parse_str("[csp]\ndbname = csp\n", Path::new("inline.cfg"))
        .unwrap();

    assert_matches!(
        config.section("augment"),
        Err(AugmentError::MissingSection(name)) if name == "augment"
    );
    assert_matches!(
        config.param("csp", "host"),
        Err(AugmentError::MissingParameter { section, parameter })
            if section == "csp" && parameter == "host"
    );
    assert_matches!(
        DatabaseSettings::from_config(&config, "csp"),
        Err(AugmentError::MissingParameter { .. })
    );
}

#[test]
fn missing_include_fails_to_load() {
    let temp = tempfile::tempdir().unwrap();
    let main = temp.path().join("main.cfg");
    fs::write(&main, "[configs]\ndb = nowhere.cfg\n").unwrap();

    let err = ConfigLoader::default().load(&main).unwrap_err();
    assert_matches!(err, AugmentError::ConfigRead(path) if path.ends_with("nowhere.cfg"));
}

#[test]
fn custom_list_delimiter() {
    let config = ConfigLoader::with_delimiter(',')
        .parse_str("[augment]\npredictors = 3, 1\n", Path::new("inline.cfg"))
        .unwrap();
    assert_eq!(
        config.value(&["augment", "predictors"]),
        Some(&ConfigValue::List(vec![
            ConfigValue::Int(3),
            ConfigValue::Int(1)
        ]))
    );
}

#[test]
fn settings_default_to_every_catalogued_predictor() {
    let temp = tempfile::tempdir().unwrap();
    let config = ConfigLoader::default().load(&write_tree(temp.path())).unwrap();
    let settings = RunSettings::from_config(&config, "map.txt".into(), "out".into()).unwrap();

    assert_eq!(settings.predictors, PREDICTOR_IDS.to_vec());
    assert_eq!(settings.chain, "A");
    assert!(settings.allows(8));
    assert!(!settings.allows(7));
}

const RUN_QUERIES_CFG: &str = "\
[csp]
dbname = csp
host = db.example.org
host_local = localhost
username = reader

[Q_afID_Index]
database = csp
query = SELECT af_id FROM af_index WHERE model = '%%%MODEL%%%'

[Q_selectUniqueAF_cspID]
database = csp
query = SELECT DISTINCT csp_id FROM shifts WHERE af_id = %%%AFID%%%

[Q_select_pdbAtoms]
database = csp
query = SELECT * FROM atoms
";

#[test]
fn run_queries_resolve_before_any_connection() {
    let loader = ConfigLoader::default();
    let complete = format!(
        "{RUN_QUERIES_CFG}\n[Q_compareCSP]\ndatabase = csp\nquery = SELECT 1\n"
    );
    let config = loader
        .parse_str(&complete, Path::new("inline.cfg"))
        .unwrap();
    validate_queries(&config, &REQUIRED_QUERIES).unwrap();

    let config = loader
        .parse_str(RUN_QUERIES_CFG, Path::new("inline.cfg"))
        .unwrap();
    let err = PgQueryRunner::new(config)
        .validate(&REQUIRED_QUERIES)
        .unwrap_err();
    assert!(err.is_fatal());
    assert_matches!(err, AugmentError::QueryNotFound(name) if name == "Q_compareCSP");
}

#[test]
fn run_query_pointing_at_unknown_database_is_fatal() {
    let text = RUN_QUERIES_CFG.replace("[csp]", "[other]");
    let config = ConfigLoader::default()
        .parse_str(&text, Path::new("inline.cfg"))
        .unwrap();

    let err = validate_queries(&config, &REQUIRED_QUERIES).unwrap_err();
    assert!(err.is_fatal());
    assert_matches!(err, AugmentError::MissingSection(name) if name == "csp");
}
