//! Engine behavior across units: bridging, cancellation, failure isolation

use isoguard::config::{DomainConfig, OverrideConfig, ViaModelKind};
use isoguard::prelude::*;
use isoguard::{
    CancelToken, ConfigError, Feature, FeatureKind, InconclusiveReason, LayerScope, Point, SolverKind,
};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load(board: &str, rules: &str) -> (BoardSnapshot, IsolationConfig) {
    (
        BoardSnapshot::load(&fixture_path(board)).unwrap(),
        IsolationConfig::load(&fixture_path(rules)).unwrap(),
    )
}

fn domain(name: &str, voltage: f64, patterns: &[&str]) -> DomainConfig {
    DomainConfig {
        name: name.to_string(),
        voltage_rms: voltage,
        net_class: None,
        net_patterns: patterns.iter().map(|p| p.to_string()).collect(),
        requires_reinforced_insulation: false,
    }
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

/// Three domains in a row with a ground pad between each neighbour
fn three_domain_board() -> (BoardSnapshot, IsolationConfig) {
    let mut board = BoardSnapshot::new().with_layer("F.Cu", 0.0).with_layer("B.Cu", 1.6);
    let mut id = 1;
    let mut add = |board: &mut BoardSnapshot, layer: &str, net: &str, geometry: Vec<Point>| {
        board.add_feature(Feature::new(id, FeatureKind::Pad, layer, Some(net), geometry));
        id += 1;
    };
    for layer in ["F.Cu", "B.Cu"] {
        add(&mut board, layer, "MAINS_L", rect(0.0, -0.5, 1.0, 0.5));
        add(&mut board, layer, "BUS_48V", rect(6.0, -0.5, 7.0, 0.5));
        add(&mut board, layer, "VCC_5V", rect(12.0, -0.5, 13.0, 0.5));
        add(&mut board, layer, "GND", rect(3.0, -1.5, 4.0, 1.5));
        add(&mut board, layer, "GND", rect(9.0, -1.5, 10.0, 1.5));
    }
    let mut config = IsolationConfig::default();
    config.voltage_domains = vec![
        domain("MAINS", 230.0, &["MAINS"]),
        domain("BUS", 48.0, &["48V"]),
        domain("SELV", 5.0, &["5V"]),
    ];
    (board, config)
}

#[test]
fn test_creepage_through_via() {
    let (board, config) = load("two_layer_via.json", "rules_mains_selv.json");
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();

    assert_eq!(report.units.len(), 1);
    let unit = &report.units[0];
    assert_eq!(
        unit.scope,
        LayerScope::Bridge {
            from: "F.Cu".to_string(),
            to: "B.Cu".to_string()
        }
    );
    // Cross-layer clearance is only compared in 3D mode
    assert!(unit.clearance.is_none());
    let creepage = unit.creepage.as_ref().unwrap();
    // 5 mm to the via, 0.3 mm drill, 5 mm to the pad
    assert!((creepage.actual.value().unwrap() - 10.3).abs() < 1e-9);
    assert_eq!(creepage.status, CheckStatus::Pass);
}

#[test]
fn test_slot_between_pad_and_via_breaks_bridge() {
    let (board, config) = load("two_layer_via_slot.json", "rules_mains_selv.json");
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();

    assert_eq!(report.units.len(), 1);
    let creepage = report.units[0].creepage.as_ref().unwrap();
    // Going around the slot would be finite, the straight line is cut
    assert_eq!(creepage.actual, Distance::Infinite);
    assert_eq!(creepage.status, CheckStatus::Fail);
    let pair = report.pair("MAINS", "SELV").unwrap();
    assert_eq!(pair.creepage, Some(Distance::Infinite));
    assert_eq!(pair.status, CheckStatus::Fail);
}

#[test]
fn test_barrel_length_model() {
    let (board, mut config) = load("two_layer_via.json", "rules_mains_selv.json");
    config.search.via_model = ViaModelKind::BarrelLength;
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    let creepage = report.units[0].creepage.as_ref().unwrap();
    assert!((creepage.actual.value().unwrap() - 11.9).abs() < 1e-9);
}

#[test]
fn test_cross_layer_disabled_leaves_nothing_to_check() {
    let (board, mut config) = load("two_layer_via.json", "rules_mains_selv.json");
    config.search.cross_layer = false;
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    assert!(report.units.is_empty());
    assert!(report.passed());
}

#[test]
fn test_clearance_3d_across_layers() {
    let (board, mut config) = load("two_layer_via.json", "rules_mains_selv.json");
    config.search.clearance_3d = true;
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    let clearance = report.units[0].clearance.as_ref().unwrap();
    let expected = 10.0f64.hypot(1.6);
    assert!((clearance.actual.value().unwrap() - expected).abs() < 1e-9);
    let creepage = report.units[0].creepage.as_ref().unwrap().actual.value().unwrap();
    assert!(creepage + 1e-9 >= clearance.actual.value().unwrap());
}

#[test]
fn test_net_class_matches_before_patterns() {
    let (board, mut config) = load("two_layer_via.json", "rules_mains_selv.json");
    // A pattern that would also claim MAINS_L for SELV
    config.voltage_domains[1].net_patterns.push("MAINS".to_string());
    config.voltage_domains[0].net_class = Some("mains".to_string());
    config.voltage_domains.swap(0, 1);
    config.isolation_requirements.clear();

    let domains = IsoGuardCore::classify(&board, &config).unwrap();
    let summary = domains.summary();
    let mains = summary.iter().find(|d| d.name == "MAINS").unwrap();
    assert_eq!(mains.nets_from_class, vec!["MAINS_L".to_string()]);
    assert!(mains.nets_from_pattern.is_empty());
}

#[test]
fn test_configuration_errors_are_fatal() {
    let (board, mut config) = load("pads_no_obstacles.json", "rules_mains_selv.json");
    config.voltage_domains.push(domain("MAINS", 400.0, &["HV"]));
    match IsoGuardCore::verify(&board, &config, RunOptions::default()) {
        Err(IsoGuardError::Config(ConfigError::DuplicateDomain(name))) => {
            assert_eq!(name, "MAINS")
        }
        other => panic!("expected duplicate domain error, got {:?}", other.map(|r| r.stats)),
    }

    let (board, mut config) = load("pads_no_obstacles.json", "rules_mains_selv.json");
    config.isolation_requirements.push(OverrideConfig {
        domain_a: "MAINS".to_string(),
        domain_b: "HVDC".to_string(),
        isolation_type: Default::default(),
        min_clearance_mm: 1.0,
        min_creepage_mm: 1.0,
        description: None,
    });
    assert!(matches!(
        IsoGuardCore::verify(&board, &config, RunOptions::default()),
        Err(IsoGuardError::Config(ConfigError::UnknownOverrideDomain(_)))
    ));
}

#[test]
fn test_cancellation_between_units() {
    let (board, config) = three_domain_board();
    let token = CancelToken::new();
    token.cancel();
    for parallel in [false, true] {
        let options = RunOptions {
            parallel,
            cancel: Some(token.clone()),
        };
        assert!(matches!(
            IsoGuardCore::verify(&board, &config, options),
            Err(IsoGuardError::Cancelled { completed: 0 })
        ));
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let (board, config) = three_domain_board();
    let sequential = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    let parallel = IsoGuardCore::verify(
        &board,
        &config,
        RunOptions {
            parallel: true,
            cancel: None,
        },
    )
    .unwrap();

    assert_eq!(sequential.units, parallel.units);
    assert_eq!(sequential.pairs, parallel.pairs);
    assert_eq!(sequential.stats.violations, parallel.stats.violations);
    // 3 pairs, 2 layers each
    assert_eq!(sequential.stats.pairs_checked, 3);
    assert_eq!(sequential.units.len(), 6);
}

#[test]
fn test_inconclusive_creepage_keeps_other_results() {
    let (board, mut config) = three_domain_board();
    // Every search goes to A* and gives up after one expansion
    config.search.sparse_threshold = 0;
    config.search.astar_iteration_cap = 1;
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();

    let blocked = report.pair("MAINS", "BUS").unwrap();
    assert_eq!(
        blocked.creepage,
        Some(Distance::Inconclusive(InconclusiveReason::IterationCap))
    );
    assert_eq!(blocked.status, CheckStatus::Inconclusive);
    let unit = &report.units[blocked.units[0]];
    assert_eq!(unit.algorithm, Some(SolverKind::AStar));

    // Clearance does not depend on the creepage search
    let far = report.pair("MAINS", "SELV").unwrap();
    assert!(far.clearance.and_then(|d| d.value()).is_some());
    assert!(report.inconclusive().count() >= 2);
    assert_eq!(report.pairs.len(), 3);
}
