use criterion::{black_box, criterion_group, criterion_main, Criterion};
use isoguard::analysis::creepage::{AStarSolver, PathQuery, PathSolver, VisibilityGraphSolver};
use isoguard::geometry::ObstacleField;
use isoguard::prelude::*;
use isoguard::{BBox, Feature, FeatureKind, Point};

fn rect(x: f64, y: f64, size: f64) -> Vec<Point> {
    vec![
        Point::new(x, y),
        Point::new(x + size, y),
        Point::new(x + size, y + size),
        Point::new(x, y + size),
    ]
}

/// `n` × `n` pads between x = 2 and the goal
fn pad_field(n: usize) -> ObstacleField {
    let pitch = 20.0 / n as f64;
    let obstacles = (0..n * n)
        .map(|k| {
            let (i, j) = (k / n, k % n);
            (
                rect(2.0 + i as f64 * pitch, -10.0 + j as f64 * pitch, pitch * 0.6),
                Some(k as u64),
            )
        })
        .collect();
    ObstacleField::build(
        BBox::of_segment(Point::new(-5.0, -15.0), Point::new(30.0, 15.0)),
        1.0,
        65_536,
        obstacles,
        None,
    )
}

fn bench_sparse_visibility_graph(c: &mut Criterion) {
    let field = pad_field(8);
    let query = PathQuery::new(Point::new(0.0, 0.1), Point::new(25.0, -0.1));
    let solver = VisibilityGraphSolver::default();
    c.bench_function("visibility_graph_64_obstacles", |b| {
        b.iter(|| solver.shortest_path(black_box(&field), black_box(&query)));
    });
}

fn bench_dense_astar(c: &mut Criterion) {
    let field = pad_field(20);
    let query = PathQuery::new(Point::new(0.0, 0.1), Point::new(25.0, -0.1));
    let solver = AStarSolver::default();
    c.bench_function("astar_400_obstacles", |b| {
        b.iter(|| solver.shortest_path(black_box(&field), black_box(&query)));
    });
}

fn bench_verify_board(c: &mut Criterion) {
    let mut board = BoardSnapshot::new().with_layer("F.Cu", 0.0);
    board.add_feature(Feature::new(1, FeatureKind::Pad, "F.Cu", Some("MAINS_L"), rect(-2.0, -0.5, 1.0)));
    board.add_feature(Feature::new(2, FeatureKind::Pad, "F.Cu", Some("VCC_5V"), rect(25.0, -0.5, 1.0)));
    for k in 0..150u64 {
        let (i, j) = (k / 10, k % 10);
        board.add_feature(Feature::new(
            10 + k,
            FeatureKind::Pad,
            "F.Cu",
            Some("GND"),
            rect(2.0 + i as f64 * 1.4, -7.0 + j as f64 * 1.4, 0.8),
        ));
    }
    let config = IsolationConfig::from_json_str(
        r#"{
            "voltage_domains": [
                { "name": "MAINS", "voltage_rms": 230.0, "net_patterns": ["MAINS"] },
                { "name": "SELV", "voltage_rms": 5.0, "net_patterns": ["5V"] }
            ]
        }"#,
    )
    .unwrap();

    c.bench_function("verify_dense_board", |b| {
        b.iter(|| IsoGuardCore::verify(black_box(&board), black_box(&config), RunOptions::default()));
    });
}

criterion_group!(
    benches,
    bench_sparse_visibility_graph,
    bench_dense_astar,
    bench_verify_board
);
criterion_main!(benches);
