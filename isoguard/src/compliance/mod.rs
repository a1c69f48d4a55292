//! Compliance: voltage domains and the isolation distances they require

pub mod domains;
pub mod requirements;
pub mod tables;

use serde::{Deserialize, Serialize};

pub use domains::{DomainId, DomainMap, DomainSummary, MatchSource, VoltageDomain};
pub use requirements::{IsolationRequirement, RequirementResolver, RequirementSource};
pub use tables::{Lookup, Selection, StandardTable, TableSet};

/// Clearance (through air) or creepage (along the surface)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceKind {
    Clearance,
    Creepage,
}

impl std::fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceKind::Clearance => f.write_str("clearance"),
            DistanceKind::Creepage => f.write_str("creepage"),
        }
    }
}
