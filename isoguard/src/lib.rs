//! IsoGuard - electrical isolation verification for PCB layouts
//!
//! Assigns board nets to voltage domains, resolves the clearance and
//! creepage each domain pair needs from IEC 60664-1 / IPC-2221 tables,
//! and measures the actual distances on every copper layer.
//!
//! # Quick Start
//!
//! ```no_run
//! use isoguard::{IsoGuardCore, RunOptions};
//! use std::path::Path;
//!
//! let report = IsoGuardCore::load_and_verify(
//!     Path::new("board.json"),
//!     Path::new("isolation.json"),
//!     RunOptions::default(),
//! ).unwrap();
//!
//! for violation in &report.violations {
//!     println!("{:?}: {}", violation.status, violation.message);
//! }
//! ```
//!
//! # Features
//!
//! - **Domain classification**: net classes first, then net-name patterns
//! - **Clearance**: closest approach between domain features, per layer
//! - **Creepage**: surface paths around foreign copper, broken by cutouts,
//!   optionally through vias between layers
//! - **Requirements**: table interpolation, reinforced insulation, safety
//!   margin, altitude correction and explicit overrides

pub mod analysis;
pub mod board;
pub mod compliance;
pub mod config;
pub mod core;
pub mod geometry;
pub mod report;

// Re-export main types
pub use analysis::{Distance, InconclusiveReason, LayerScope, SolverKind};
pub use board::{BoardSnapshot, Feature, FeatureId, FeatureKind, FeatureProvider, Layer, Shape};
pub use compliance::{
    DistanceKind, DomainMap, IsolationRequirement, RequirementResolver, TableSet,
};
pub use config::{ConfigError, IsolationConfig, Standard};
pub use core::{CancelToken, IsoGuardCore, IsoGuardError, RunContext, RunOptions};
pub use geometry::{BBox, Point};
pub use report::{CheckStatus, Measurement, PairResult, UnitResult, VerificationReport, Violation};

/// Load a board snapshot (convenience wrapper).
pub fn load_board(path: &std::path::Path) -> Result<BoardSnapshot, IsoGuardError> {
    BoardSnapshot::load(path)
}

/// Load isolation rules (convenience wrapper).
pub fn load_config(path: &std::path::Path) -> Result<IsolationConfig, IsoGuardError> {
    IsolationConfig::load(path)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardSnapshot, CheckStatus, Distance, FeatureProvider, IsoGuardCore, IsoGuardError,
        IsolationConfig, RunOptions, VerificationReport, Violation,
    };
}
