//! Shared fixtures: one small two-district city with every source kind

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

pub const EIXAMPLE_WKT: &str =
    "POLYGON ((2.15899 41.38879, 2.17056 41.38712, 2.16963 41.39499, 2.15899 41.38879))";

/// Write raw sources and a city config under `dir`, returning the config path.
pub fn write_city_fixtures(dir: &Path) -> PathBuf {
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();

    fs::write(
        raw.join("districts.json"),
        serde_json::to_string_pretty(&json!([
            {
                "nom_districte": "Ciutat Vella",
                "Codi_Districte": "1",
                "geometria_wgs84": "POLYGON ((2.16 41.37, 2.18 41.37, 2.17 41.39, 2.16 41.37))"
            },
            {
                "nom_districte": "Eixample",
                "Codi_Districte": "2",
                "geometria_wgs84": EIXAMPLE_WKT
            }
        ]))
        .unwrap(),
    )
    .unwrap();

    fs::write(
        raw.join("neighbourhoods.json"),
        serde_json::to_string_pretty(&json!([
            {
                "nom_barri": "el Fort Pienc",
                "codi_barri": "5",
                "nom_districte": "Eixample",
                "geometria_wgs84": "POLYGON ((2.18 41.39, 2.19 41.39, 2.185 41.40, 2.18 41.39))"
            },
            {
                "nom_barri": "la Sagrada Família",
                "codi_barri": "6",
                "nom_districte": "Eixample",
                "geometria_wgs84": "POLYGON ((2.17 41.40, 2.19 41.40, 2.18 41.41, 2.17 41.40))"
            }
        ]))
        .unwrap(),
    )
    .unwrap();

    fs::write(
        raw.join("equipaments.csv"),
        "Nom_Equipament,Tipus_Equipament,Latitud,Longitud,Codi_Districte,Codi_Barri,Adreca\n\
         Biblioteca Arús,Biblioteques de Barcelona,41.39656,2.17704,2,6,\"Passeig de Sant Joan, 26\"\n",
    )
    .unwrap();

    fs::write(
        raw.join("renda.csv"),
        "Codi_Districte,Codi_Barri,Import_Renda\n\
         2,5,30000\n\
         2,6,41000\n",
    )
    .unwrap();

    let config_path = dir.join("bcn.yaml");
    fs::write(
        &config_path,
        r#"
city: bcn
city_id: 1
districts:
  path: raw/districts.json
  name_column: nom_districte
  code_column: Codi_Districte
  geometry_column: geometria_wgs84
neighbourhoods:
  path: raw/neighbourhoods.json
  name_column: nom_barri
  code_column: codi_barri
  geometry_column: geometria_wgs84
  district_ref:
    column: nom_districte
    key: name
point_features:
  path: raw/equipaments.csv
  format: csv
  name_column: Nom_Equipament
  category_column: Tipus_Equipament
  latitude_column: Latitud
  longitude_column: Longitud
  district_code_column: Codi_Districte
  neighbourhood_code_column: Codi_Barri
  category_map:
    Biblioteques de Barcelona: Bibliotecas
indicators:
  sources:
    - path: raw/renda.csv
      format: csv
      indicator: Average gross household income
      neighbourhood_key: district-and-code
      district_code_column: Codi_Districte
      neighbourhood_code_column: Codi_Barri
      value_column: Import_Renda
      year: 2022
      reduce: mean
"#,
    )
    .unwrap();
    config_path
}

/// Seed the reference tables the pipeline expects to pre-exist.
pub async fn seed_reference_tables(store: &dyn geostage::TableStore) {
    store
        .insert("cities", &[json!({"name": "Barcelona"})])
        .await
        .unwrap();
    store
        .insert("feature_types", &[json!({"name": "Bibliotecas"})])
        .await
        .unwrap();
    store
        .insert(
            "indicator_definitions",
            &[json!({"name": "Average gross household income"})],
        )
        .await
        .unwrap();
}
