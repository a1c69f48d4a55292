//! Standards tables for clearance and creepage
//!
//! Built-in tables:
//! - IEC 60664-1 clearance, by overvoltage category and pollution degree,
//!   derived from the rated impulse voltage of the supply (Tables F.1/F.2,
//!   inhomogeneous field).
//! - IEC 60664-1 creepage, by pollution degree and material group
//!   (Table F.4; printed wiring column for pollution degree 1).
//! - IPC-2221 Table 6-1 B2 (external conductors, uncoated, sea level to
//!   3050 m), used for both clearance and creepage. Indexed by the same
//!   RMS/DC working voltage difference as the IEC tables.

use super::DistanceKind;
use crate::config::{
    validate_breakpoints, ConfigError, InsulationType, IsolationConfig, MaterialGroup,
    OvervoltageCategory, Standard, TableConfig,
};

/// Working voltage rows of the impulse voltage table (V RMS/DC)
const IMPULSE_ROWS: [f64; 6] = [50.0, 100.0, 150.0, 300.0, 600.0, 1000.0];

/// Rated impulse voltage (V) per overvoltage category, aligned with `IMPULSE_ROWS`
const IMPULSE_OVC_I: [f64; 6] = [330.0, 500.0, 800.0, 1500.0, 2500.0, 4000.0];
const IMPULSE_OVC_II: [f64; 6] = [500.0, 800.0, 1500.0, 2500.0, 4000.0, 6000.0];
const IMPULSE_OVC_III: [f64; 6] = [800.0, 1500.0, 2500.0, 4000.0, 6000.0, 8000.0];
const IMPULSE_OVC_IV: [f64; 6] = [1500.0, 2500.0, 4000.0, 6000.0, 8000.0, 12000.0];

/// Minimum clearance (mm) for a rated impulse voltage, pollution degree 1
const IMPULSE_CLEARANCE: [(f64, f64); 9] = [
    (330.0, 0.01),
    (500.0, 0.04),
    (800.0, 0.1),
    (1500.0, 0.5),
    (2500.0, 1.5),
    (4000.0, 3.0),
    (6000.0, 5.5),
    (8000.0, 8.0),
    (12000.0, 14.0),
];

/// Pollution degree floors on clearance (mm)
const MIN_CLEARANCE_PD2: f64 = 0.2;
const MIN_CLEARANCE_PD3: f64 = 0.8;

const CREEPAGE_ROWS: [f64; 12] = [
    50.0, 100.0, 125.0, 160.0, 200.0, 250.0, 320.0, 400.0, 500.0, 630.0, 800.0, 1000.0,
];
const CREEPAGE_PWB_PD1: [f64; 12] = [
    0.025, 0.1, 0.16, 0.25, 0.4, 0.56, 0.75, 1.0, 1.3, 1.8, 2.4, 3.2,
];
const CREEPAGE_PD2_MG1: [f64; 12] = [
    0.6, 0.71, 0.75, 0.8, 1.0, 1.25, 1.6, 2.0, 2.5, 3.2, 4.0, 5.0,
];
const CREEPAGE_PD2_MG2: [f64; 12] = [
    0.85, 1.0, 1.05, 1.1, 1.4, 1.8, 2.2, 2.8, 3.6, 4.5, 5.6, 7.1,
];
const CREEPAGE_PD2_MG3: [f64; 12] = [
    1.2, 1.4, 1.5, 1.6, 2.0, 2.5, 3.2, 4.0, 5.0, 6.3, 8.0, 10.0,
];
const CREEPAGE_PD3_MG1: [f64; 12] = [
    1.5, 1.8, 1.9, 2.0, 2.5, 3.2, 4.0, 5.0, 6.3, 8.0, 10.0, 12.5,
];
const CREEPAGE_PD3_MG2: [f64; 12] = [
    1.7, 2.0, 2.1, 2.2, 2.8, 3.6, 4.5, 5.6, 7.1, 9.0, 11.0, 14.0,
];
const CREEPAGE_PD3_MG3: [f64; 12] = [
    1.9, 2.2, 2.4, 2.5, 3.2, 4.0, 5.0, 6.3, 8.0, 10.0, 12.5, 16.0,
];

/// IPC-2221 B2 spacing (V RMS/DC difference, mm), 0.005 mm/V above 500 V
const IPC2221_B2: [(f64, f64); 9] = [
    (0.0, 0.1),
    (30.0, 0.1),
    (31.0, 0.6),
    (150.0, 0.6),
    (151.0, 1.25),
    (300.0, 1.25),
    (301.0, 2.5),
    (500.0, 2.5),
    (1000.0, 5.0),
];

/// Which configurations a table applies to; `None` matches anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableKey {
    pub category: Option<OvervoltageCategory>,
    pub pollution_degree: Option<u8>,
    pub material_group: Option<MaterialGroup>,
}

/// The configured axes a table is looked up by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub category: OvervoltageCategory,
    pub pollution_degree: u8,
    pub material_group: MaterialGroup,
}

impl Selection {
    pub fn from_config(config: &IsolationConfig) -> Self {
        Self {
            category: config.overvoltage_category,
            pollution_degree: config.pollution_degree,
            material_group: config.material_group,
        }
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OVC {:?}, PD{}, MG {:?}",
            self.category, self.pollution_degree, self.material_group
        )
    }
}

impl TableKey {
    /// Number of axes pinned, or `None` if the key excludes `sel`
    fn specificity(&self, sel: &Selection) -> Option<u8> {
        let mut score = 0;
        if let Some(c) = self.category {
            if c != sel.category {
                return None;
            }
            score += 1;
        }
        if let Some(pd) = self.pollution_degree {
            if pd != sel.pollution_degree {
                return None;
            }
            score += 1;
        }
        if let Some(mg) = self.material_group {
            if mg != sel.material_group {
                return None;
            }
            score += 1;
        }
        Some(score)
    }
}

/// Result of a table lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    pub value: f64,
    /// Voltage was above the last breakpoint
    pub clamped: bool,
}

/// Piecewise-linear voltage to distance table
#[derive(Debug, Clone)]
pub struct StandardTable {
    pub name: String,
    pub standard: Standard,
    pub kind: DistanceKind,
    pub key: TableKey,
    pub insulation: InsulationType,
    pub breakpoints: Vec<(f64, f64)>,
    pub builtin: bool,
}

impl StandardTable {
    /// Interpolate between breakpoints, clamping at both ends
    pub fn lookup(&self, voltage: f64) -> Lookup {
        interpolate(&self.breakpoints, voltage)
    }

    pub fn max_voltage(&self) -> f64 {
        self.breakpoints.last().map(|b| b.0).unwrap_or(0.0)
    }

    pub fn is_reinforced(&self) -> bool {
        self.insulation == InsulationType::Reinforced
    }
}

pub fn interpolate(points: &[(f64, f64)], voltage: f64) -> Lookup {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Lookup {
            value: 0.0,
            clamped: false,
        };
    };
    if voltage <= first.0 {
        return Lookup {
            value: first.1,
            clamped: false,
        };
    }
    if voltage > last.0 {
        return Lookup {
            value: last.1,
            clamped: true,
        };
    }
    let value = points
        .windows(2)
        .find(|w| voltage <= w[1].0)
        .map(|w| {
            let ((v0, d0), (v1, d1)) = (w[0], w[1]);
            d0 + (voltage - v0) / (v1 - v0) * (d1 - d0)
        })
        .unwrap_or(last.1);
    Lookup {
        value,
        clamped: false,
    }
}

/// User tables followed by the built-in ones
#[derive(Debug, Clone)]
pub struct TableSet {
    tables: Vec<StandardTable>,
}

impl TableSet {
    pub fn builtin() -> Self {
        let mut tables = Vec::new();

        for (category, impulse) in [
            (OvervoltageCategory::I, IMPULSE_OVC_I),
            (OvervoltageCategory::II, IMPULSE_OVC_II),
            (OvervoltageCategory::III, IMPULSE_OVC_III),
            (OvervoltageCategory::IV, IMPULSE_OVC_IV),
        ] {
            for (pd, floor) in [(1u8, 0.0), (2, MIN_CLEARANCE_PD2), (3, MIN_CLEARANCE_PD3)] {
                let breakpoints = IMPULSE_ROWS
                    .iter()
                    .zip(impulse.iter())
                    .map(|(&v, &uimp)| (v, interpolate(&IMPULSE_CLEARANCE, uimp).value.max(floor)))
                    .collect();
                tables.push(StandardTable {
                    name: format!("IEC60664-1 clearance OVC {:?} PD{}", category, pd),
                    standard: Standard::Iec60664,
                    kind: DistanceKind::Clearance,
                    key: TableKey {
                        category: Some(category),
                        pollution_degree: Some(pd),
                        material_group: None,
                    },
                    insulation: InsulationType::Basic,
                    breakpoints,
                    builtin: true,
                });
            }
        }

        let creepage_columns: [(u8, Option<MaterialGroup>, &[f64; 12]); 9] = [
            (1, None, &CREEPAGE_PWB_PD1),
            (2, Some(MaterialGroup::I), &CREEPAGE_PD2_MG1),
            (2, Some(MaterialGroup::II), &CREEPAGE_PD2_MG2),
            (2, Some(MaterialGroup::IIIa), &CREEPAGE_PD2_MG3),
            (2, Some(MaterialGroup::IIIb), &CREEPAGE_PD2_MG3),
            (3, Some(MaterialGroup::I), &CREEPAGE_PD3_MG1),
            (3, Some(MaterialGroup::II), &CREEPAGE_PD3_MG2),
            (3, Some(MaterialGroup::IIIa), &CREEPAGE_PD3_MG3),
            (3, Some(MaterialGroup::IIIb), &CREEPAGE_PD3_MG3),
        ];
        for (pd, group, column) in creepage_columns {
            let name = match group {
                Some(g) => format!("IEC60664-1 creepage PD{} MG {:?}", pd, g),
                None => format!("IEC60664-1 creepage PD{} printed wiring", pd),
            };
            tables.push(StandardTable {
                name,
                standard: Standard::Iec60664,
                kind: DistanceKind::Creepage,
                key: TableKey {
                    category: None,
                    pollution_degree: Some(pd),
                    material_group: group,
                },
                insulation: InsulationType::Basic,
                breakpoints: CREEPAGE_ROWS.iter().copied().zip(column.iter().copied()).collect(),
                builtin: true,
            });
        }

        for kind in [DistanceKind::Clearance, DistanceKind::Creepage] {
            tables.push(StandardTable {
                name: format!("IPC2221 B2 {}", kind),
                standard: Standard::Ipc2221,
                kind,
                key: TableKey::default(),
                insulation: InsulationType::Basic,
                breakpoints: IPC2221_B2.to_vec(),
                builtin: true,
            });
        }

        Self { tables }
    }

    /// Built-ins plus the configured tables, which win ties
    pub fn from_config(config: &IsolationConfig) -> Result<Self, ConfigError> {
        let mut tables = Vec::new();
        for table in &config.tables {
            tables.extend(user_tables(table)?);
        }
        tables.extend(Self::builtin().tables);
        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[StandardTable] {
        &self.tables
    }

    /// Most specific table for the selection
    ///
    /// With `reinforced` set, reinforced-encoded tables are considered
    /// first; otherwise they are ignored.
    pub fn select(
        &self,
        standard: Standard,
        kind: DistanceKind,
        sel: &Selection,
        reinforced: bool,
    ) -> Option<&StandardTable> {
        let pick = |want_reinforced: bool| {
            let mut best: Option<(&StandardTable, u8)> = None;
            for table in &self.tables {
                if table.standard != standard
                    || table.kind != kind
                    || table.is_reinforced() != want_reinforced
                {
                    continue;
                }
                let Some(score) = table.key.specificity(sel) else {
                    continue;
                };
                // Strictly greater keeps the earlier (user) table on ties
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((table, score));
                }
            }
            best.map(|(t, _)| t)
        };
        if reinforced {
            if let Some(table) = pick(true) {
                return Some(table);
            }
        }
        pick(false)
    }
}

fn user_tables(config: &TableConfig) -> Result<Vec<StandardTable>, ConfigError> {
    let key = TableKey {
        category: config.overvoltage_category,
        pollution_degree: config.pollution_degree,
        material_group: config.material_group,
    };
    let standards: Vec<Standard> = match config.standard {
        Standard::Both => vec![Standard::Iec60664, Standard::Ipc2221],
        s => vec![s],
    };
    let mut tables = Vec::new();
    for (kind, breakpoints) in [
        (DistanceKind::Clearance, &config.clearance),
        (DistanceKind::Creepage, &config.creepage),
    ] {
        if breakpoints.is_empty() {
            continue;
        }
        validate_breakpoints(&config.name, breakpoints)?;
        for &standard in &standards {
            tables.push(StandardTable {
                name: config.name.clone(),
                standard,
                kind,
                key,
                insulation: config.insulation,
                breakpoints: breakpoints.clone(),
                builtin: false,
            });
        }
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(category: OvervoltageCategory, pd: u8, mg: MaterialGroup) -> Selection {
        Selection {
            category,
            pollution_degree: pd,
            material_group: mg,
        }
    }

    #[test]
    fn test_interpolation_and_clamp() {
        let points = [(100.0, 1.0), (200.0, 3.0)];
        assert_eq!(interpolate(&points, 50.0).value, 1.0);
        assert!((interpolate(&points, 150.0).value - 2.0).abs() < 1e-12);
        let high = interpolate(&points, 500.0);
        assert_eq!(high.value, 3.0);
        assert!(high.clamped);
        assert!(!interpolate(&points, 200.0).clamped);
    }

    #[test]
    fn test_builtin_tables_are_well_formed() {
        for table in TableSet::builtin().tables() {
            assert!(
                validate_breakpoints(&table.name, &table.breakpoints).is_ok(),
                "{}",
                table.name
            );
        }
    }

    #[test]
    fn test_iec_clearance_ovc2_pd2() {
        let set = TableSet::builtin();
        let sel = selection(OvervoltageCategory::II, 2, MaterialGroup::II);
        let table = set
            .select(Standard::Iec60664, DistanceKind::Clearance, &sel, false)
            .unwrap();
        // 300 V in OVC II is a 2500 V impulse
        assert!((table.lookup(300.0).value - 1.5).abs() < 1e-12);
        // Pollution degree 2 floor
        assert!((table.lookup(50.0).value - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_creepage_selects_material_group() {
        let set = TableSet::builtin();
        let sel = selection(OvervoltageCategory::II, 2, MaterialGroup::IIIb);
        let table = set
            .select(Standard::Iec60664, DistanceKind::Creepage, &sel, false)
            .unwrap();
        assert!((table.lookup(250.0).value - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_pollution_degree_4_has_no_builtin() {
        let set = TableSet::builtin();
        let sel = selection(OvervoltageCategory::II, 4, MaterialGroup::II);
        assert!(set
            .select(Standard::Iec60664, DistanceKind::Creepage, &sel, false)
            .is_none());
        // IPC tables are wildcard keyed
        assert!(set
            .select(Standard::Ipc2221, DistanceKind::Creepage, &sel, false)
            .is_some());
    }

    #[test]
    fn test_user_table_wins_tie_and_reinforced_preferred() {
        let mut config = IsolationConfig::default();
        config.tables = vec![
            TableConfig {
                name: "house".to_string(),
                standard: Standard::Iec60664,
                overvoltage_category: Some(OvervoltageCategory::II),
                pollution_degree: Some(2),
                material_group: None,
                insulation: InsulationType::Basic,
                clearance: vec![(0.0, 1.0), (400.0, 4.0)],
                creepage: vec![],
            },
            TableConfig {
                name: "house-reinforced".to_string(),
                standard: Standard::Iec60664,
                overvoltage_category: None,
                pollution_degree: None,
                material_group: None,
                insulation: InsulationType::Reinforced,
                clearance: vec![(0.0, 3.0), (400.0, 9.0)],
                creepage: vec![],
            },
        ];
        let set = TableSet::from_config(&config).unwrap();
        let sel = Selection::from_config(&config);
        let basic = set
            .select(Standard::Iec60664, DistanceKind::Clearance, &sel, false)
            .unwrap();
        assert_eq!(basic.name, "house");
        let reinforced = set
            .select(Standard::Iec60664, DistanceKind::Clearance, &sel, true)
            .unwrap();
        assert_eq!(reinforced.name, "house-reinforced");
        // Creepage falls back to the built-in table
        let creepage = set
            .select(Standard::Iec60664, DistanceKind::Creepage, &sel, false)
            .unwrap();
        assert!(creepage.builtin);
    }
}
