//! Isolation requirement resolution
//!
//! An explicit requirement for the domain pair is used as written (the
//! safety margin is re-applied only when `apply_margin_to_overrides` is
//! set). Otherwise the voltage difference is looked up in the selected
//! standards tables, doubled for reinforced insulation, scaled by the
//! safety margin, and clearance is corrected for altitude.

use serde::Serialize;

use super::domains::VoltageDomain;
use super::tables::{Selection, TableSet};
use super::DistanceKind;
use crate::config::{ConfigError, InsulationType, IsolationConfig, Standard};

/// Where a requirement came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementSource {
    Override,
    Table {
        standard: Standard,
        clearance_table: String,
        creepage_table: String,
    },
}

/// Required distances for one domain pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsolationRequirement {
    pub domain_a: String,
    pub domain_b: String,
    pub insulation: InsulationType,
    pub clearance_mm: f64,
    pub creepage_mm: f64,
    pub voltage_difference: f64,
    pub source: RequirementSource,
    pub description: String,
    /// The voltage difference exceeded a table and was clamped
    pub clamped: bool,
}

impl IsolationRequirement {
    pub fn required(&self, kind: DistanceKind) -> f64 {
        match kind {
            DistanceKind::Clearance => self.clearance_mm,
            DistanceKind::Creepage => self.creepage_mm,
        }
    }
}

/// One standard's answer for one distance kind
#[derive(Debug, Clone)]
struct TableValue {
    value: f64,
    clamped: bool,
    table: String,
}

pub struct RequirementResolver<'a> {
    config: &'a IsolationConfig,
    tables: TableSet,
    selection: Selection,
}

fn standards(standard: Standard) -> &'static [Standard] {
    match standard {
        Standard::Iec60664 => &[Standard::Iec60664],
        Standard::Ipc2221 => &[Standard::Ipc2221],
        Standard::Both => &[Standard::Iec60664, Standard::Ipc2221],
    }
}

impl<'a> RequirementResolver<'a> {
    /// Build the table set and make sure every needed table exists
    pub fn new(config: &'a IsolationConfig) -> Result<Self, ConfigError> {
        let tables = TableSet::from_config(config)?;
        let selection = Selection::from_config(config);

        for &standard in standards(config.standard) {
            for kind in [DistanceKind::Clearance, DistanceKind::Creepage] {
                if tables.select(standard, kind, &selection, false).is_none() {
                    return Err(ConfigError::MissingTable {
                        kind: kind.to_string(),
                        selection: format!("{} {}", standard, selection),
                    });
                }
            }
        }

        Ok(Self {
            config,
            tables,
            selection,
        })
    }

    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Basic-insulation table distance before margin and altitude
    pub fn basic_distance(&self, kind: DistanceKind, voltage: f64) -> f64 {
        self.table_distance(kind, voltage, false).value
    }

    /// Table distance after insulation scaling, before margin and altitude
    pub fn insulated_distance(&self, kind: DistanceKind, voltage: f64, reinforced: bool) -> f64 {
        self.table_distance(kind, voltage, reinforced).value
    }

    fn table_distance(&self, kind: DistanceKind, voltage: f64, reinforced: bool) -> TableValue {
        let mut best: Option<TableValue> = None;
        for &standard in standards(self.config.standard) {
            let Some(table) = self.tables.select(standard, kind, &self.selection, reinforced)
            else {
                continue;
            };
            let lookup = table.lookup(voltage);
            if lookup.clamped {
                tracing::warn!(
                    "{:.1} V exceeds table '{}' (max {} V), clamping {} to {:.3} mm",
                    voltage,
                    table.name,
                    table.max_voltage(),
                    kind,
                    lookup.value
                );
            }
            let value = if reinforced && !table.is_reinforced() {
                lookup.value * 2.0
            } else {
                lookup.value
            };
            let candidate = TableValue {
                value,
                clamped: lookup.clamped,
                table: table.name.clone(),
            };
            best = match best {
                Some(b) if b.value >= candidate.value => Some(TableValue {
                    clamped: b.clamped || candidate.clamped,
                    ..b
                }),
                Some(b) => Some(TableValue {
                    clamped: b.clamped || candidate.clamped,
                    ..candidate
                }),
                None => Some(candidate),
            };
        }
        // Construction guarantees a table per standard and kind
        best.unwrap_or(TableValue {
            value: 0.0,
            clamped: false,
            table: String::new(),
        })
    }

    pub fn resolve(&self, a: &VoltageDomain, b: &VoltageDomain) -> IsolationRequirement {
        let voltage_difference = (a.voltage - b.voltage).abs();

        if let Some(req) = self
            .config
            .isolation_requirements
            .iter()
            .find(|r| r.matches(&a.name, &b.name))
        {
            let margin = if self.config.apply_margin_to_overrides {
                self.config.safety_margin_factor
            } else {
                1.0
            };
            let description = req.description.clone().unwrap_or_else(|| {
                format!("{} insulation (explicit requirement)", req.isolation_type)
            });
            tracing::debug!(
                "{} <-> {}: explicit requirement {:.3}/{:.3} mm",
                a.name,
                b.name,
                req.min_clearance_mm,
                req.min_creepage_mm
            );
            return IsolationRequirement {
                domain_a: a.name.clone(),
                domain_b: b.name.clone(),
                insulation: req.isolation_type,
                clearance_mm: req.min_clearance_mm * margin,
                creepage_mm: req.min_creepage_mm * margin,
                voltage_difference,
                source: RequirementSource::Override,
                description,
                clamped: false,
            };
        }

        let reinforced = a.reinforced || b.reinforced;
        let insulation = if reinforced {
            InsulationType::Reinforced
        } else {
            InsulationType::Basic
        };

        let clearance = self.table_distance(DistanceKind::Clearance, voltage_difference, reinforced);
        let creepage = self.table_distance(DistanceKind::Creepage, voltage_difference, reinforced);

        let margin = self.config.safety_margin_factor;
        let clearance_mm = clearance.value * margin * self.config.altitude_factor();
        let creepage_mm = creepage.value * margin;

        tracing::debug!(
            "{} <-> {}: {:.1} V {} -> clearance {:.3} mm, creepage {:.3} mm",
            a.name,
            b.name,
            voltage_difference,
            insulation,
            clearance_mm,
            creepage_mm
        );

        IsolationRequirement {
            domain_a: a.name.clone(),
            domain_b: b.name.clone(),
            insulation,
            clearance_mm,
            creepage_mm,
            voltage_difference,
            source: RequirementSource::Table {
                standard: self.config.standard,
                clearance_table: clearance.table,
                creepage_table: creepage.table,
            },
            description: format!(
                "{:.1}V differential, {} insulation",
                voltage_difference, insulation
            ),
            clamped: clearance.clamped || creepage.clamped,
        }
    }
}
