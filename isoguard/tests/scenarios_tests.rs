//! Reference scenarios for clearance, creepage and requirement resolution

use isoguard::compliance::RequirementResolver;
use isoguard::prelude::*;
use isoguard::{DistanceKind, Feature, FeatureKind, InconclusiveReason, PairResult, Point, SolverKind};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn run(board: &str, rules: &str) -> VerificationReport {
    IsoGuardCore::load_and_verify(
        &fixture_path(board),
        &fixture_path(rules),
        RunOptions::default(),
    )
    .expect("verification should run")
}

fn mains_selv(report: &VerificationReport) -> &PairResult {
    report
        .pair("MAINS", "SELV")
        .expect("MAINS <-> SELV should be checked")
}

fn measured(distance: Option<Distance>) -> f64 {
    match distance {
        Some(Distance::Measured(v)) => v,
        other => panic!("expected a measurement, got {:?}", other),
    }
}

#[test]
fn test_pads_without_obstacles() {
    let report = run("pads_no_obstacles.json", "rules_mains_selv.json");
    let pair = mains_selv(&report);

    assert!((measured(pair.clearance) - 5.0).abs() < 1e-9);
    assert!((measured(pair.creepage) - 5.0).abs() < 1e-9);
    assert_eq!(pair.status, CheckStatus::Pass);
    assert!(report.passed());
}

#[test]
fn test_detour_around_single_obstacle() {
    let report = run("pads_single_obstacle.json", "rules_mains_selv.json");
    let pair = mains_selv(&report);

    assert!((measured(pair.clearance) - 5.0).abs() < 1e-9);
    let creepage = measured(pair.creepage);
    assert!(creepage > 5.0);
    // (0,0) -> (2,±1) -> (3,±1) -> (5,0)
    let expected = 2.0 * 5.0f64.sqrt() + 1.0;
    assert!((creepage - expected).abs() < 1e-9, "creepage {}", creepage);

    let unit = &report.units[pair.units[0]];
    assert_eq!(unit.obstacle_count, 1);
    assert_eq!(unit.algorithm, Some(SolverKind::VisibilityGraph));
    let path = &unit.creepage.as_ref().unwrap().path;
    assert_eq!(path.len(), 4);
}

#[test]
fn test_slot_breaks_creepage() {
    let report = run("pads_across_slot.json", "rules_mains_selv.json");
    let pair = mains_selv(&report);

    assert!((measured(pair.clearance) - 2.0).abs() < 1e-9);
    assert_eq!(pair.creepage, Some(Distance::Infinite));
    assert_eq!(pair.status, CheckStatus::Fail);

    let violation = report
        .failures()
        .find(|v| v.kind == DistanceKind::Creepage)
        .expect("infinite creepage is a violation");
    assert!(!violation.inconclusive);
}

#[test]
fn test_reinforced_requirement_from_table() {
    let config = IsolationConfig::load(&fixture_path("rules_reinforced_table.json")).unwrap();
    let board = BoardSnapshot::load(&fixture_path("pads_no_obstacles.json")).unwrap();
    let domains = IsoGuardCore::classify(&board, &config).unwrap();
    let resolver = RequirementResolver::new(&config).unwrap();

    let mains = &domains.domains()[0];
    let selv = &domains.domains()[1];
    let requirement = resolver.resolve(mains, selv);

    assert!((requirement.voltage_difference - 225.0).abs() < 1e-12);
    assert!((resolver.basic_distance(DistanceKind::Clearance, 225.0) - 2.5).abs() < 1e-12);
    assert!((requirement.clearance_mm - 6.0).abs() < 1e-9);
    assert!((requirement.creepage_mm - 6.0).abs() < 1e-9);
    assert_eq!(
        requirement.description,
        "225.0V differential, reinforced insulation"
    );

    // 5 mm falls short of 6 mm
    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    assert_eq!(mains_selv(&report).status, CheckStatus::Fail);
    assert_eq!(report.stats.violations, 2);
}

#[test]
fn test_obstacle_ceiling_skips_layer() {
    let mut board = BoardSnapshot::load(&fixture_path("pads_single_obstacle.json")).unwrap();
    let mut next_id = 100;
    // 600 small pads scattered around the pair
    for i in 0..30 {
        for j in 0..20 {
            let (x, y) = (-7.0 + i as f64 * 0.6, 2.0 + j as f64 * 0.6);
            board.add_feature(Feature::new(
                next_id,
                FeatureKind::Pad,
                "F.Cu",
                Some("GND"),
                vec![
                    Point::new(x, y),
                    Point::new(x + 0.3, y),
                    Point::new(x + 0.3, y + 0.3),
                    Point::new(x, y + 0.3),
                ],
            ));
            next_id += 1;
        }
    }
    let config = IsolationConfig::load(&fixture_path("rules_mains_selv.json")).unwrap();
    assert_eq!(config.search.obstacle_ceiling, 500);

    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    let pair = mains_selv(&report);
    let unit = &report.units[pair.units[0]];

    assert!(unit.skipped);
    assert_eq!(unit.obstacle_count, 601);
    assert_eq!(
        pair.creepage,
        Some(Distance::Inconclusive(InconclusiveReason::ObstacleCeiling))
    );
    assert_eq!(pair.status, CheckStatus::Inconclusive);
    assert_eq!(report.stats.units_skipped, 1);
    assert_eq!(report.stats.inconclusive, 1);
    assert!(!report.passed());
    // Clearance is still measured on a skipped layer
    assert!((measured(pair.clearance) - 5.0).abs() < 1e-9);
}

fn add_pad(board: &mut BoardSnapshot, id: u64, layer: &str, net: &str, geometry: Vec<Point>) {
    board.add_feature(Feature::new(id, FeatureKind::Pad, layer, Some(net), geometry));
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
    vec![
        Point::new(x0, y0),
        Point::new(x1, y0),
        Point::new(x1, y1),
        Point::new(x0, y1),
    ]
}

#[test]
fn test_creepage_leaves_pad_where_the_path_is_shortest() {
    // A long pad under a ground bar, a small pad above it. The closest
    // points are stacked behind the bar; the shortest route leaves the long
    // pad right below the bar's left corner.
    let mut board = BoardSnapshot::new().with_layer("F.Cu", 0.0);
    add_pad(&mut board, 1, "F.Cu", "MAINS_L", rect(0.0, -0.5, 10.0, 0.0));
    add_pad(&mut board, 2, "F.Cu", "VCC_5V", rect(4.4, 5.0, 4.6, 5.2));
    add_pad(&mut board, 3, "F.Cu", "GND", rect(3.0, 2.0, 7.0, 3.0));
    let mut config = IsolationConfig::load(&fixture_path("rules_mains_selv.json")).unwrap();

    // (3,0) -> (3,3) -> (4.4,5)
    let expected = 3.0 + 1.4f64.hypot(2.0);
    for threshold in [100, 0] {
        config.search.sparse_threshold = threshold;
        let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
        let pair = mains_selv(&report);
        assert!((measured(pair.clearance) - 5.0).abs() < 1e-9);
        let creepage = measured(pair.creepage);
        assert!((creepage - expected).abs() < 1e-6, "creepage {}", creepage);

        let measurement = report.units[pair.units[0]].creepage.as_ref().unwrap();
        assert!(measurement.from.distance(&Point::new(3.0, 0.0)) < 1e-6);
        assert!(measurement.to.distance(&Point::new(4.4, 5.0)) < 1e-6);
    }
}

#[test]
fn test_skipped_layer_keeps_pair_from_passing() {
    // Clean on F.Cu, crowded past the ceiling on B.Cu
    let mut board = BoardSnapshot::new()
        .with_layer("F.Cu", 0.0)
        .with_layer("B.Cu", 1.6);
    let mut next_id = 1;
    for layer in ["F.Cu", "B.Cu"] {
        add_pad(&mut board, next_id, layer, "MAINS_L", rect(-1.0, -0.5, 0.0, 0.5));
        add_pad(&mut board, next_id + 1, layer, "VCC_5V", rect(8.0, -0.5, 9.0, 0.5));
        next_id += 2;
    }
    for i in 0..30 {
        for j in 0..20 {
            let (x, y) = (-5.0 + i as f64 * 0.6, 2.0 + j as f64 * 0.6);
            add_pad(&mut board, next_id, "B.Cu", "GND", rect(x, y, x + 0.3, y + 0.3));
            next_id += 1;
        }
    }
    let mut config = IsolationConfig::load(&fixture_path("rules_mains_selv.json")).unwrap();
    config.search.cross_layer = false;

    let report = IsoGuardCore::verify(&board, &config, RunOptions::default()).unwrap();
    let pair = mains_selv(&report);
    assert_eq!(pair.units.len(), 2);
    assert!(report.units[pair.units[1]].skipped);
    // F.Cu measured 8 mm and passes, B.Cu was never verified
    assert!((measured(pair.creepage) - 8.0).abs() < 1e-9);
    assert_eq!(pair.status, CheckStatus::Inconclusive);
    assert!(!report.passed());
}
