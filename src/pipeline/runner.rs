//! Stage orchestration
//!
//! One runner per city per run. Each stage extracts its sources, builds its
//! lookup caches from the store, builds records row by row, writes the
//! staged file, and uploads. The upload is what makes the next stage's
//! caches possible — caches are never updated intra-run.

use super::collector::ErrorCollector;
use super::source::read_rows;
use super::stage::Stage;
use super::staging::write_staged;
use crate::builder::{
    DistrictBuilder, IndicatorBuilder, IndicatorRecord, NeighbourhoodBuilder, PointFeatureBuilder,
};
use crate::lookup::{FatalLookupError, LookupCache, NaturalKey, NeighbourhoodKey};
use crate::normalize::config::{CityConfig, DistrictKeyKind};
use crate::store::{StoreError, TableStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that abort a stage.
///
/// Everything row-scoped goes to the [`ErrorCollector`] instead; a stage
/// only fails when it has no foreign-key universe or cannot reach its
/// sources, its staging directory, or the store.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Lookup(#[from] FatalLookupError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to read source {path}: {detail}")]
    Source { path: PathBuf, detail: String },

    #[error("failed to write staged output {path}: {detail}")]
    Staging { path: PathBuf, detail: String },

    #[error("indicator definition '{0}' not found in store")]
    UnknownIndicator(String),

    #[error("pipeline already complete")]
    Finished,
}

/// What one stage did
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub city: String,
    pub built: usize,
    pub skipped: usize,
    pub uploaded: usize,
    /// Deduplicated identifiers of failing source entries
    pub failing: BTreeSet<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Forward-only pipeline runner for one city
pub struct StageRunner {
    store: Arc<dyn TableStore>,
    config: CityConfig,
    staging_dir: PathBuf,
    current: Stage,
    collector: ErrorCollector,
}

impl StageRunner {
    pub fn new(
        store: Arc<dyn TableStore>,
        config: CityConfig,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::starting_at(store, config, staging_dir, Stage::Districts)
    }

    /// Start at a later stage. The empty-cache fatal enforces that the
    /// earlier stages' output is actually in the store.
    pub fn starting_at(
        store: Arc<dyn TableStore>,
        config: CityConfig,
        staging_dir: impl Into<PathBuf>,
        stage: Stage,
    ) -> Self {
        Self {
            store,
            config,
            staging_dir: staging_dir.into(),
            current: stage,
            collector: ErrorCollector::new(),
        }
    }

    pub fn current_stage(&self) -> Stage {
        self.current
    }

    pub fn collector(&self) -> &ErrorCollector {
        &self.collector
    }

    /// Run the current stage and advance. [`StageError::Finished`] once the
    /// sequence is exhausted.
    pub async fn run_next(&mut self) -> Result<StageReport, StageError> {
        let stage = self.current;
        if stage == Stage::Done {
            return Err(StageError::Finished);
        }

        let started_at = Utc::now();
        info!(city = %self.config.city, %stage, "running stage");

        let (built, uploaded) = match stage {
            Stage::Districts => self.run_districts().await?,
            Stage::Neighbourhoods => self.run_neighbourhoods().await?,
            Stage::PointFeatures => self.run_point_features().await?,
            Stage::Indicators => self.run_indicators().await?,
            Stage::Done => (0, 0),
        };

        let failing = self.collector.failing_identifiers(stage);
        let skipped = self.collector.for_stage(stage).count();
        if !failing.is_empty() {
            warn!(
                city = %self.config.city,
                %stage,
                identifiers = ?failing,
                "issues with source entries"
            );
        }
        info!(city = %self.config.city, %stage, built, skipped, uploaded, "stage complete");

        self.current = stage.next();
        Ok(StageReport {
            stage,
            city: self.config.city.clone(),
            built,
            skipped,
            uploaded,
            failing,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run every remaining stage in order.
    pub async fn run_all(&mut self) -> Result<Vec<StageReport>, StageError> {
        let mut reports = Vec::new();
        while self.current != Stage::Done {
            reports.push(self.run_next().await?);
        }
        Ok(reports)
    }

    async fn run_districts(&mut self) -> Result<(usize, usize), StageError> {
        let cfg = match &self.config.districts {
            Some(cfg) => cfg.clone(),
            None => {
                info!(city = %self.config.city, "no district source configured; skipping");
                return Ok((0, 0));
            }
        };

        let rows = read_rows(&cfg.source)?;
        let builder = DistrictBuilder::new(&cfg, self.config.city_id);

        let mut records = Vec::new();
        for row in &rows {
            match builder.build(row) {
                Ok(record) => records.push(record),
                Err(error) => self.collector.record(
                    Stage::Districts,
                    builder.identifier(row),
                    error.to_string(),
                ),
            }
        }

        let uploaded = self.stage_and_upload(Stage::Districts, &records).await?;
        Ok((records.len(), uploaded))
    }

    async fn run_neighbourhoods(&mut self) -> Result<(usize, usize), StageError> {
        let cfg = match &self.config.neighbourhoods {
            Some(cfg) => cfg.clone(),
            None => {
                info!(city = %self.config.city, "no neighbourhood source configured; skipping");
                return Ok((0, 0));
            }
        };

        let districts = match cfg.district_ref.key {
            DistrictKeyKind::Name => {
                LookupCache::districts_by_name(&*self.store, self.config.city_id).await?
            }
            DistrictKeyKind::Code => {
                LookupCache::districts_by_code(&*self.store, self.config.city_id).await?
            }
        };

        let rows = read_rows(&cfg.source)?;
        let builder = NeighbourhoodBuilder::new(&cfg, self.config.city_id, &districts);

        let mut records = Vec::new();
        for row in &rows {
            match builder.build(row) {
                Ok(record) => records.push(record),
                Err(error) => self.collector.record(
                    Stage::Neighbourhoods,
                    builder.identifier(row),
                    error.to_string(),
                ),
            }
        }

        let uploaded = self
            .stage_and_upload(Stage::Neighbourhoods, &records)
            .await?;
        Ok((records.len(), uploaded))
    }

    async fn run_point_features(&mut self) -> Result<(usize, usize), StageError> {
        let cfg = match &self.config.point_features {
            Some(cfg) => cfg.clone(),
            None => {
                info!(city = %self.config.city, "no point-feature source configured; skipping");
                return Ok((0, 0));
            }
        };

        let city_id = self.config.city_id;
        let districts = LookupCache::districts_by_code(&*self.store, city_id).await?;
        let neighbourhoods =
            LookupCache::neighbourhoods(&*self.store, city_id, NeighbourhoodKey::DistrictAndCode)
                .await?;
        let feature_types = LookupCache::feature_types(&*self.store).await?;

        let rows = read_rows(&cfg.source)?;
        let builder = PointFeatureBuilder::new(
            &cfg,
            self.config.geo_level_id,
            &districts,
            &neighbourhoods,
            &feature_types,
        );

        let mut records = Vec::new();
        for row in &rows {
            match builder.build(row) {
                Ok(record) => records.push(record),
                Err(error) => self.collector.record(
                    Stage::PointFeatures,
                    builder.identifier(row),
                    error.to_string(),
                ),
            }
        }

        let uploaded = self
            .stage_and_upload(Stage::PointFeatures, &records)
            .await?;
        Ok((records.len(), uploaded))
    }

    async fn run_indicators(&mut self) -> Result<(usize, usize), StageError> {
        let stage_cfg = match &self.config.indicators {
            Some(stage_cfg) if !stage_cfg.sources.is_empty() => stage_cfg.clone(),
            _ => {
                info!(city = %self.config.city, "no indicator sources configured; skipping");
                return Ok((0, 0));
            }
        };

        let city_id = self.config.city_id;
        let definitions = LookupCache::indicator_definitions(&*self.store).await?;

        let needs_pair = stage_cfg
            .sources
            .iter()
            .any(|s| s.neighbourhood_key == NeighbourhoodKey::DistrictAndCode);
        let needs_code = stage_cfg
            .sources
            .iter()
            .any(|s| s.neighbourhood_key == NeighbourhoodKey::Code);

        let by_pair = if needs_pair {
            Some(
                LookupCache::neighbourhoods(
                    &*self.store,
                    city_id,
                    NeighbourhoodKey::DistrictAndCode,
                )
                .await?,
            )
        } else {
            None
        };
        let by_code = if needs_code {
            Some(LookupCache::neighbourhoods(&*self.store, city_id, NeighbourhoodKey::Code).await?)
        } else {
            None
        };
        let districts = if needs_pair {
            Some(LookupCache::districts_by_code(&*self.store, city_id).await?)
        } else {
            None
        };

        let mut records: Vec<IndicatorRecord> = Vec::new();
        for source in &stage_cfg.sources {
            let indicator_def_id = definitions
                .get(&NaturalKey::name(&source.indicator))
                .ok_or_else(|| StageError::UnknownIndicator(source.indicator.clone()))?;

            let neighbourhoods = match source.neighbourhood_key {
                NeighbourhoodKey::Code => by_code.as_ref(),
                NeighbourhoodKey::DistrictAndCode => by_pair.as_ref(),
            };
            let neighbourhoods = match neighbourhoods {
                Some(cache) => cache,
                // Shape caches exist for every shape in use.
                None => continue,
            };

            let rows = read_rows(&source.source)?;
            let mut builder = IndicatorBuilder::new(
                source,
                indicator_def_id,
                self.config.geo_level_id,
                neighbourhoods,
            );
            if let Some(districts) = districts.as_ref() {
                builder = builder.with_districts(districts);
            }

            let (mut built, failures) = builder.build_batch(&rows);
            for failure in failures {
                self.collector.record(
                    Stage::Indicators,
                    failure.identifier,
                    failure.error.to_string(),
                );
            }
            info!(
                indicator = %source.indicator,
                built = built.len(),
                "indicator source processed"
            );
            records.append(&mut built);
        }

        let uploaded = self.stage_and_upload(Stage::Indicators, &records).await?;
        Ok((records.len(), uploaded))
    }

    /// Write the staged file and bulk-upload the batch. Empty batches are
    /// staged but never uploaded.
    async fn stage_and_upload<T: Serialize>(
        &self,
        stage: Stage,
        records: &[T],
    ) -> Result<usize, StageError> {
        let table = match stage.table() {
            Some(table) => table,
            None => return Ok(0),
        };

        let path = write_staged(&self.staging_dir, table, &self.config.city, records)?;
        info!(staged = %path.display(), count = records.len(), "wrote staged file");

        if records.is_empty() {
            warn!(table, "no records to upload; skipping");
            return Ok(0);
        }

        let values: Vec<serde_json::Value> = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()
            .map_err(StoreError::from)?;
        let uploaded = self.store.insert(table, &values).await?;
        info!(table, uploaded, "uploaded batch");
        Ok(uploaded)
    }
}
