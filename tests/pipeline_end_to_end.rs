//! End-to-end pipeline run against the SQLite store, through the public API

mod common;

use common::{seed_reference_tables, write_city_fixtures, EIXAMPLE_WKT};
use geostage::pipeline::staged_path;
use geostage::{
    CityConfig, FatalLookupError, FidelityValidator, SqliteStore, Stage, StageError, StageRunner,
    TableStore,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn full_city_run_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_city_fixtures(dir.path());
    let config = CityConfig::from_path(&config_path).unwrap();

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_reference_tables(store.as_ref()).await;

    let staging = dir.path().join("processed");
    let mut runner = StageRunner::new(store.clone(), config, &staging);
    let reports = runner.run_all().await.unwrap();

    assert_eq!(reports.len(), 4);
    assert_eq!(reports[0].built, 2); // districts
    assert_eq!(reports[1].built, 2); // neighbourhoods
    assert_eq!(reports[2].built, 1); // point features
    assert_eq!(reports[3].built, 2); // indicators
    assert!(reports.iter().all(|r| r.failing.is_empty()));

    // Districts landed with canonical codes and tagged geometry.
    let districts = store.select("districts", &[]).await.unwrap();
    assert_eq!(districts.len(), 2);
    assert_eq!(districts[1]["name"], json!("Eixample"));
    assert_eq!(districts[1]["code"], json!("02"));
    assert_eq!(
        districts[1]["geom"],
        json!(format!("SRID=4326;{}", EIXAMPLE_WKT))
    );

    // Neighbourhoods reference the surrogate ids the store assigned.
    let neighbourhoods = store.select("neighbourhoods", &[]).await.unwrap();
    assert!(neighbourhoods
        .iter()
        .all(|n| n["district_id"] == json!(2) && n["city_id"] == json!(1)));

    // The point feature resolved its neighbourhood and kept the
    // pass-through property.
    let features = store.select("point_features", &[]).await.unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["geo_id"], json!(2));
    assert_eq!(
        features[0]["properties"]["Adreca"],
        json!("Passeig de Sant Joan, 26")
    );

    // Indicators cover both units for the fixed year.
    let indicators = store.select("indicators", &[]).await.unwrap();
    assert_eq!(indicators.len(), 2);
    assert!(indicators.iter().all(|i| i["year"] == json!(2022)));
}

#[tokio::test]
async fn staged_geometry_survives_normalization() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_city_fixtures(dir.path());
    let config = CityConfig::from_path(&config_path).unwrap();

    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_reference_tables(store.as_ref()).await;

    let staging = dir.path().join("processed");
    let mut runner = StageRunner::new(store, config, &staging);
    runner.run_all().await.unwrap();

    let report = FidelityValidator::default()
        .validate_files(
            &dir.path().join("raw/districts.json"),
            "geometria_wgs84",
            &staged_path(&staging, "districts", "bcn"),
            &[0, 1],
        )
        .unwrap();
    assert!(report.is_clean());
}

#[tokio::test]
async fn stages_cannot_run_ahead_of_their_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_city_fixtures(dir.path());
    let config = CityConfig::from_path(&config_path).unwrap();

    // Nothing uploaded yet: the neighbourhood stage has no district
    // universe to resolve against.
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut runner = StageRunner::starting_at(
        store,
        config,
        dir.path().join("processed"),
        Stage::Neighbourhoods,
    );

    let err = runner.run_next().await.unwrap_err();
    assert!(matches!(
        err,
        StageError::Lookup(FatalLookupError::Empty {
            entity: "districts",
            ..
        })
    ));
}
