//! Isolation rules configuration
//!
//! Loaded from JSON. Every field has a default so a rules file only needs
//! to list its voltage domains.
//!
//! ```json
//! {
//!   "standard": "IEC60664-1",
//!   "overvoltage_category": "II",
//!   "pollution_degree": 2,
//!   "safety_margin_factor": 1.2,
//!   "voltage_domains": [
//!     { "name": "MAINS", "voltage_rms": 230, "net_patterns": ["AC_L", "AC_N"],
//!       "requires_reinforced_insulation": true },
//!     { "name": "SELV", "voltage_rms": 5, "net_class": "LowVoltage" }
//!   ],
//!   "isolation_requirements": [
//!     { "domain_a": "MAINS", "domain_b": "SELV", "isolation_type": "reinforced",
//!       "min_clearance_mm": 6.0, "min_creepage_mm": 8.0 }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::IsoGuardError;

/// Fatal configuration defects, reported before any measurement
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("duplicate voltage domain '{0}'")]
    DuplicateDomain(String),
    #[error("voltage domain #{0} has an empty name")]
    EmptyDomainName(usize),
    #[error("voltage domain '{0}' has no net class and no net patterns")]
    EmptyRule(String),
    #[error("voltage domain '{0}' has an empty net pattern")]
    EmptyPattern(String),
    #[error("table '{table}' is malformed: {reason}")]
    MalformedTable { table: String, reason: String },
    #[error("no {kind} table for {selection}")]
    MissingTable { kind: String, selection: String },
    #[error("isolation requirement names unknown domain '{0}'")]
    UnknownOverrideDomain(String),
    #[error("isolation requirement pairs domain '{0}' with itself")]
    SelfPairOverride(String),
    #[error("isolation requirement {pair} has a negative distance")]
    NegativeOverride { pair: String },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Insulation-coordination standard used for derived requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Standard {
    #[default]
    #[serde(rename = "IEC60664-1", alias = "IEC60664", alias = "IEC 60664-1")]
    Iec60664,
    #[serde(rename = "IPC2221", alias = "IPC-2221")]
    Ipc2221,
    /// Both standards, larger value wins
    #[serde(rename = "BOTH")]
    Both,
}

impl std::fmt::Display for Standard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Standard::Iec60664 => "IEC60664-1",
            Standard::Ipc2221 => "IPC2221",
            Standard::Both => "BOTH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum OvervoltageCategory {
    I,
    #[default]
    II,
    III,
    IV,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum MaterialGroup {
    I,
    #[default]
    II,
    IIIa,
    IIIb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InsulationType {
    Functional,
    #[default]
    Basic,
    Supplementary,
    Reinforced,
}

impl std::fmt::Display for InsulationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InsulationType::Functional => "functional",
            InsulationType::Basic => "basic",
            InsulationType::Supplementary => "supplementary",
            InsulationType::Reinforced => "reinforced",
        };
        f.write_str(s)
    }
}

/// One voltage domain and the rule that assigns nets to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    /// Nominal voltage (RMS or DC magnitude), may be negative
    #[serde(alias = "voltage")]
    pub voltage_rms: f64,
    /// Net class tag, matched before any pattern
    #[serde(default)]
    pub net_class: Option<String>,
    /// Case-insensitive substrings of the net name
    #[serde(default, alias = "patterns")]
    pub net_patterns: Vec<String>,
    #[serde(default, alias = "reinforced")]
    pub requires_reinforced_insulation: bool,
}

/// Explicit requirement for one (unordered) domain pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideConfig {
    pub domain_a: String,
    pub domain_b: String,
    #[serde(default)]
    pub isolation_type: InsulationType,
    pub min_clearance_mm: f64,
    pub min_creepage_mm: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl OverrideConfig {
    pub fn matches(&self, a: &str, b: &str) -> bool {
        (self.domain_a == a && self.domain_b == b) || (self.domain_a == b && self.domain_b == a)
    }
}

/// A user-supplied standards table
///
/// Unset category, pollution degree or material group act as wildcards.
/// Breakpoints are `[voltage, distance_mm]` pairs in ascending voltage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub standard: Standard,
    #[serde(default)]
    pub overvoltage_category: Option<OvervoltageCategory>,
    #[serde(default)]
    pub pollution_degree: Option<u8>,
    #[serde(default)]
    pub material_group: Option<MaterialGroup>,
    /// `reinforced` tables are used as-is for reinforced pairs
    #[serde(default)]
    pub insulation: InsulationType,
    #[serde(default)]
    pub clearance: Vec<(f64, f64)>,
    #[serde(default)]
    pub creepage: Vec<(f64, f64)>,
}

/// How the creepage across a via barrel is approximated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViaModelKind {
    #[default]
    DrillDiameter,
    /// Layer separation plus drill diameter
    BarrelLength,
}

/// Bounds on the geometric search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Layers with more obstacles than this are skipped
    pub obstacle_ceiling: usize,
    /// Layers whose obstacles carry more corners than this are skipped
    pub vertex_ceiling: usize,
    /// Below this many obstacles the exact visibility graph is used
    pub sparse_threshold: usize,
    /// ...and below this many corners
    pub sparse_vertex_threshold: usize,
    pub search_margin_mm: f64,
    pub cell_size_mm: f64,
    pub max_grid_cells: usize,
    pub astar_neighbors: usize,
    pub astar_iteration_cap: usize,
    pub astar_stall_limit: usize,
    /// Closest feature pairs searched per domain pair and layer scope
    pub endpoint_pairs: usize,
    /// Vias tried per cross-layer endpoint pair
    pub bridge_vias: usize,
    pub cross_layer: bool,
    pub clearance_3d: bool,
    pub via_model: ViaModelKind,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            obstacle_ceiling: 500,
            vertex_ceiling: 20_000,
            sparse_threshold: 100,
            sparse_vertex_threshold: 600,
            search_margin_mm: 20.0,
            cell_size_mm: 1.0,
            max_grid_cells: 65_536,
            astar_neighbors: 16,
            astar_iteration_cap: 20_000,
            astar_stall_limit: 2_000,
            endpoint_pairs: 16,
            bridge_vias: 8,
            cross_layer: true,
            clearance_3d: false,
            via_model: ViaModelKind::DrillDiameter,
        }
    }
}

fn default_pollution_degree() -> u8 {
    2
}

fn default_altitude() -> f64 {
    1000.0
}

fn default_altitude_threshold() -> f64 {
    2000.0
}

fn default_altitude_coefficient() -> f64 {
    0.00025
}

fn default_safety_margin() -> f64 {
    1.2
}

/// Complete configuration of a verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationConfig {
    #[serde(default)]
    pub standard: Standard,
    #[serde(default)]
    pub overvoltage_category: OvervoltageCategory,
    #[serde(default = "default_pollution_degree")]
    pub pollution_degree: u8,
    #[serde(default)]
    pub material_group: MaterialGroup,
    #[serde(default = "default_altitude")]
    pub altitude_m: f64,
    #[serde(default = "default_altitude_threshold")]
    pub altitude_threshold_m: f64,
    /// Clearance grows by this fraction per meter above the threshold
    #[serde(default = "default_altitude_coefficient")]
    pub altitude_coefficient: f64,
    #[serde(default = "default_safety_margin")]
    pub safety_margin_factor: f64,
    /// Re-apply the safety margin to explicit requirements
    #[serde(default)]
    pub apply_margin_to_overrides: bool,
    #[serde(default)]
    pub voltage_domains: Vec<DomainConfig>,
    #[serde(default)]
    pub isolation_requirements: Vec<OverrideConfig>,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            standard: Standard::default(),
            overvoltage_category: OvervoltageCategory::default(),
            pollution_degree: default_pollution_degree(),
            material_group: MaterialGroup::default(),
            altitude_m: default_altitude(),
            altitude_threshold_m: default_altitude_threshold(),
            altitude_coefficient: default_altitude_coefficient(),
            safety_margin_factor: default_safety_margin(),
            apply_margin_to_overrides: false,
            voltage_domains: Vec::new(),
            isolation_requirements: Vec::new(),
            tables: Vec::new(),
            search: SearchConfig::default(),
        }
    }
}

impl IsolationConfig {
    pub fn load(path: &Path) -> Result<Self, IsoGuardError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, IsoGuardError> {
        serde_json::from_str(json).map_err(|e| IsoGuardError::Parse(format!("rules: {}", e)))
    }

    pub fn domain(&self, name: &str) -> Option<&DomainConfig> {
        self.voltage_domains.iter().find(|d| d.name == name)
    }

    /// Multiplier applied to clearance at the configured altitude
    pub fn altitude_factor(&self) -> f64 {
        if self.altitude_m > self.altitude_threshold_m {
            1.0 + self.altitude_coefficient * (self.altitude_m - self.altitude_threshold_m)
        } else {
            1.0
        }
    }

    /// Human-readable table selection, e.g. `IEC60664-1 OVC II PD2 MG II`
    pub fn selection(&self) -> String {
        format!(
            "{} OVC {:?} PD{} MG {:?}",
            self.standard, self.overvoltage_category, self.pollution_degree, self.material_group
        )
    }

    /// Check everything that does not depend on table resolution
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for (i, domain) in self.voltage_domains.iter().enumerate() {
            if domain.name.trim().is_empty() {
                return Err(ConfigError::EmptyDomainName(i));
            }
            if !names.insert(domain.name.as_str()) {
                return Err(ConfigError::DuplicateDomain(domain.name.clone()));
            }
            let has_class = domain
                .net_class
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty());
            if !has_class && domain.net_patterns.is_empty() {
                return Err(ConfigError::EmptyRule(domain.name.clone()));
            }
            if domain.net_patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::EmptyPattern(domain.name.clone()));
            }
        }

        for req in &self.isolation_requirements {
            for name in [&req.domain_a, &req.domain_b] {
                if !names.contains(name.as_str()) {
                    return Err(ConfigError::UnknownOverrideDomain(name.clone()));
                }
            }
            if req.domain_a == req.domain_b {
                return Err(ConfigError::SelfPairOverride(req.domain_a.clone()));
            }
            if req.min_clearance_mm < 0.0 || req.min_creepage_mm < 0.0 {
                return Err(ConfigError::NegativeOverride {
                    pair: format!("{} <-> {}", req.domain_a, req.domain_b),
                });
            }
        }

        for table in &self.tables {
            validate_table(table)?;
        }

        self.validate_parameters()
    }

    fn validate_parameters(&self) -> Result<(), ConfigError> {
        let invalid = |name: &str, reason: &str| {
            Err(ConfigError::InvalidParameter {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };
        let s = &self.search;

        if !(self.safety_margin_factor > 0.0) {
            return invalid("safety_margin_factor", "must be positive");
        }
        if !(1..=4).contains(&self.pollution_degree) {
            return invalid("pollution_degree", "must be 1 to 4");
        }
        if !self.altitude_m.is_finite() || self.altitude_coefficient < 0.0 {
            return invalid("altitude_m", "altitude and coefficient must be finite and non-negative");
        }
        if s.obstacle_ceiling == 0 {
            return invalid("search.obstacle_ceiling", "must be at least 1");
        }
        if s.vertex_ceiling == 0 {
            return invalid("search.vertex_ceiling", "must be at least 1");
        }
        if !(s.search_margin_mm >= 0.0) {
            return invalid("search.search_margin_mm", "must be non-negative");
        }
        if !(s.cell_size_mm > 0.0) {
            return invalid("search.cell_size_mm", "must be positive");
        }
        if s.max_grid_cells == 0 {
            return invalid("search.max_grid_cells", "must be at least 1");
        }
        if s.astar_neighbors == 0 {
            return invalid("search.astar_neighbors", "must be at least 1");
        }
        if s.astar_iteration_cap == 0 || s.astar_stall_limit == 0 {
            return invalid("search.astar_iteration_cap", "caps must be at least 1");
        }
        if s.endpoint_pairs == 0 {
            return invalid("search.endpoint_pairs", "must be at least 1");
        }
        Ok(())
    }
}

/// Breakpoint list checks shared by user and built-in tables
pub fn validate_breakpoints(table: &str, points: &[(f64, f64)]) -> Result<(), ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedTable {
        table: table.to_string(),
        reason,
    };
    if points.is_empty() {
        return Err(malformed("empty breakpoint list".to_string()));
    }
    for (v, d) in points {
        if !v.is_finite() || !d.is_finite() || *v < 0.0 || *d < 0.0 {
            return Err(malformed(format!("invalid breakpoint ({}, {})", v, d)));
        }
    }
    for pair in points.windows(2) {
        let ((v0, d0), (v1, d1)) = (pair[0], pair[1]);
        if v1 <= v0 {
            return Err(malformed(format!("voltages not ascending at {}", v1)));
        }
        if d1 < d0 {
            return Err(malformed(format!("distance decreases at {} V", v1)));
        }
    }
    Ok(())
}

fn validate_table(table: &TableConfig) -> Result<(), ConfigError> {
    if table.clearance.is_empty() && table.creepage.is_empty() {
        return Err(ConfigError::MalformedTable {
            table: table.name.clone(),
            reason: "no clearance or creepage breakpoints".to_string(),
        });
    }
    if let Some(pd) = table.pollution_degree {
        if !(1..=4).contains(&pd) {
            return Err(ConfigError::MalformedTable {
                table: table.name.clone(),
                reason: format!("pollution degree {} out of range", pd),
            });
        }
    }
    if !table.clearance.is_empty() {
        validate_breakpoints(&table.name, &table.clearance)?;
    }
    if !table.creepage.is_empty() {
        validate_breakpoints(&table.name, &table.creepage)?;
    }
    Ok(())
}
