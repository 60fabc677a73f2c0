//! Indicator builder
//!
//! Unlike the boundary builders this one is batch-shaped: sources carry
//! duplicate periodic entries that must be grouped and reduced to one value
//! per (geographic unit, year) before foreign keys resolve. Coverage is
//! all-or-nothing per period and per year — a year missing any known unit is
//! dropped wholesale with a recorded warning, never emitted partially.

use super::records::IndicatorRecord;
use super::types::{BuildError, RawRow, RowFailure};
use crate::lookup::{LookupCache, NaturalKey, NeighbourhoodKey};
use crate::normalize::code::pad_code;
use crate::normalize::config::{IndicatorSource, Reduction};
use std::collections::{BTreeMap, BTreeSet};

/// Builds indicator records for one source table.
pub struct IndicatorBuilder<'a> {
    cfg: &'a IndicatorSource,
    indicator_def_id: i64,
    geo_level_id: i64,
    neighbourhoods: &'a LookupCache,
    districts: Option<&'a LookupCache>,
}

struct Entry {
    geo_id: i64,
    year: i32,
    value: f64,
}

impl<'a> IndicatorBuilder<'a> {
    pub fn new(
        cfg: &'a IndicatorSource,
        indicator_def_id: i64,
        geo_level_id: i64,
        neighbourhoods: &'a LookupCache,
    ) -> Self {
        Self {
            cfg,
            indicator_def_id,
            geo_level_id,
            neighbourhoods,
            districts: None,
        }
    }

    /// Supply the district cache; required for `district-and-code` keyed
    /// sources.
    pub fn with_districts(mut self, districts: &'a LookupCache) -> Self {
        self.districts = Some(districts);
        self
    }

    /// Aggregate the whole source into records. Row-scoped failures are
    /// returned alongside; they never abort the batch.
    pub fn build_batch(&self, rows: &[RawRow]) -> (Vec<IndicatorRecord>, Vec<RowFailure>) {
        let mut failures = Vec::new();
        let expected = self.neighbourhoods.len();

        let rows = self.complete_periods(rows, expected, &mut failures);

        let mut entries = Vec::new();
        for row in rows {
            let identifier = self.row_identifier(row);
            match self.resolve(row) {
                Ok(entry) => entries.push(entry),
                Err(error) => failures.push(RowFailure::new(identifier, error)),
            }
        }

        let reduced = self.reduce(entries);

        // Per-year coverage: every known unit or nothing.
        let mut units_by_year: BTreeMap<i32, BTreeSet<i64>> = BTreeMap::new();
        for (year, geo_id) in reduced.keys() {
            units_by_year.entry(*year).or_default().insert(*geo_id);
        }
        let mut complete_years = BTreeSet::new();
        for (year, units) in &units_by_year {
            if units.len() == expected {
                complete_years.insert(*year);
            } else {
                failures.push(RowFailure::new(
                    format!("year {}", year),
                    BuildError::Incomplete {
                        unit: format!("year {}", year),
                        have: units.len(),
                        expected,
                    },
                ));
            }
        }

        let records = reduced
            .into_iter()
            .filter(|((year, _), _)| complete_years.contains(year))
            .map(|((year, geo_id), value)| IndicatorRecord {
                indicator_def_id: self.indicator_def_id,
                geo_level_id: self.geo_level_id,
                geo_id,
                year,
                value,
            })
            .collect();

        (records, failures)
    }

    /// Pre-check for multi-period panels: a period with the wrong entry
    /// count is dropped before any per-row work.
    fn complete_periods<'r>(
        &self,
        rows: &'r [RawRow],
        expected: usize,
        failures: &mut Vec<RowFailure>,
    ) -> Vec<&'r RawRow> {
        let column = match &self.cfg.period_column {
            Some(column) => column,
            None => return rows.iter().collect(),
        };

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for row in rows {
            let period = row.identifier(column);
            *counts.entry(period).or_insert(0) += 1;
        }

        let mut incomplete = BTreeSet::new();
        for (period, have) in &counts {
            if *have != expected {
                incomplete.insert(period.clone());
                failures.push(RowFailure::new(
                    format!("period {}", period),
                    BuildError::Incomplete {
                        unit: format!("period {}", period),
                        have: *have,
                        expected,
                    },
                ));
            }
        }

        rows.iter()
            .filter(|row| !incomplete.contains(&row.identifier(column)))
            .collect()
    }

    fn resolve(&self, row: &RawRow) -> Result<Entry, BuildError> {
        let geo_id = self.resolve_geo(row)?;
        let value = self.parse_value(row)?;
        let year = match self.cfg.year {
            Some(year) => year,
            None => {
                // Config validation guarantees a year_column when no fixed
                // year is set.
                let column = self.cfg.year_column.as_deref().unwrap_or("year");
                self.parse_year(row, column)?
            }
        };
        Ok(Entry { geo_id, year, value })
    }

    fn resolve_geo(&self, row: &RawRow) -> Result<i64, BuildError> {
        let code = pad_code(&row.text(&self.cfg.neighbourhood_code_column)?)?;
        let key = match self.cfg.neighbourhood_key {
            NeighbourhoodKey::Code => NaturalKey::Code(code.clone()),
            NeighbourhoodKey::DistrictAndCode => {
                let column = self.cfg.district_code_column.as_deref().ok_or_else(|| {
                    BuildError::MissingColumn("district_code_column".to_string())
                })?;
                let district_code = pad_code(&row.text(column)?)?;
                let districts = self.districts.ok_or_else(|| BuildError::LookupMiss {
                    entity: "district",
                    key: "no district cache supplied".to_string(),
                })?;
                let district_id = districts
                    .get(&NaturalKey::Code(district_code.clone()))
                    .ok_or_else(|| BuildError::LookupMiss {
                        entity: "district",
                        key: format!("code {}", district_code),
                    })?;
                NaturalKey::DistrictCode {
                    district_id,
                    code: code.clone(),
                }
            }
        };
        self.neighbourhoods
            .get(&key)
            .ok_or_else(|| BuildError::LookupMiss {
                entity: "neighbourhood",
                key: key.to_string(),
            })
    }

    fn parse_value(&self, row: &RawRow) -> Result<f64, BuildError> {
        if !self.cfg.decimal_comma {
            return row.number(&self.cfg.value_column);
        }
        let raw = row.text(&self.cfg.value_column)?;
        let normalized = raw.trim().replace('.', "").replace(',', ".");
        normalized.parse::<f64>().map_err(|_| BuildError::Value {
            column: self.cfg.value_column.clone(),
            detail: format!("not a number: '{}'", raw),
        })
    }

    fn parse_year(&self, row: &RawRow, column: &str) -> Result<i32, BuildError> {
        let year = row.number(column)?;
        if year.fract() != 0.0 {
            return Err(BuildError::Value {
                column: column.to_string(),
                detail: format!("not a year: {}", year),
            });
        }
        Ok(year as i32)
    }

    fn reduce(&self, entries: Vec<Entry>) -> BTreeMap<(i32, i64), f64> {
        match self.cfg.reduce {
            Reduction::Mean => {
                let mut sums: BTreeMap<(i32, i64), (f64, usize)> = BTreeMap::new();
                for e in entries {
                    let slot = sums.entry((e.year, e.geo_id)).or_insert((0.0, 0));
                    slot.0 += e.value;
                    slot.1 += 1;
                }
                sums.into_iter()
                    .map(|(key, (sum, count))| (key, sum / count as f64))
                    .collect()
            }
            Reduction::LastWins => {
                let mut last = BTreeMap::new();
                for e in entries {
                    last.insert((e.year, e.geo_id), e.value);
                }
                last
            }
        }
    }

    fn row_identifier(&self, row: &RawRow) -> String {
        let code = row.identifier(&self.cfg.neighbourhood_code_column);
        match self.cfg.district_code_column.as_deref() {
            Some(column) => format!("{}-{}", row.identifier(column), code),
            None => code,
        }
    }
}
