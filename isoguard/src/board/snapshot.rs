//! JSON board snapshots
//!
//! ```json
//! {
//!   "layers": [{ "name": "F.Cu", "z_mm": 0.0 }, { "name": "B.Cu", "z_mm": 1.6 }],
//!   "net_classes": { "AC_L": "Mains" },
//!   "outline": { "type": "rect", "min": { "x": 0, "y": 0 }, "max": { "x": 50, "y": 30 } },
//!   "cutouts": [],
//!   "features": [
//!     { "kind": "pad", "layer": "F.Cu", "net": "AC_L",
//!       "shape": { "type": "circle", "center": { "x": 5, "y": 5 }, "radius": 1.0 } },
//!     { "kind": "via", "layers": ["F.Cu", "B.Cu"], "net": "GND", "drill": 0.3,
//!       "shape": { "type": "point", "at": { "x": 10, "y": 5 } } }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Feature, FeatureId, FeatureKind, FeatureProvider, Layer, ViaSpan};
use crate::core::IsoGuardError;
use crate::geometry::{Point, EPSILON};

/// Circles are approximated by this many sides
pub const CIRCLE_SEGMENTS: usize = 16;

/// Geometry as written in board files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Point { at: Point },
    Polygon { points: Vec<Point> },
    Circle { center: Point, radius: f64 },
    Rect { min: Point, max: Point },
    /// A track: centerline plus copper width
    Segment { start: Point, end: Point, width: f64 },
}

impl Shape {
    /// Convert to the point-or-polygon form used by the engine
    pub fn to_geometry(&self) -> Result<Vec<Point>, String> {
        match self {
            Shape::Point { at } => Ok(vec![*at]),
            Shape::Polygon { points } => Ok(normalize_polygon(points.clone())),
            Shape::Circle { center, radius } => {
                if *radius <= 0.0 {
                    return Err(format!("circle radius must be positive, got {}", radius));
                }
                // Circumscribed so the polygon never underestimates copper extent
                let r = radius / (std::f64::consts::PI / CIRCLE_SEGMENTS as f64).cos();
                Ok((0..CIRCLE_SEGMENTS)
                    .map(|i| {
                        let a = 2.0 * std::f64::consts::PI * (i as f64 + 0.5)
                            / CIRCLE_SEGMENTS as f64;
                        Point::new(center.x + r * a.cos(), center.y + r * a.sin())
                    })
                    .collect())
            }
            Shape::Rect { min, max } => Ok(vec![
                Point::new(min.x, min.y),
                Point::new(max.x, min.y),
                Point::new(max.x, max.y),
                Point::new(min.x, max.y),
            ]),
            Shape::Segment { start, end, width } => {
                if *width <= 0.0 {
                    return Err(format!("track width must be positive, got {}", width));
                }
                let half = width / 2.0;
                let dir = *end - *start;
                let len = dir.length();
                let (ux, uy) = if len <= EPSILON {
                    (1.0, 0.0)
                } else {
                    (dir.x / len, dir.y / len)
                };
                // Square end caps extended by half the width
                let along = Point::new(ux, uy) * half;
                let normal = Point::new(-uy, ux) * half;
                let (s, e) = (*start - along, *end + along);
                Ok(vec![s + normal, s - normal, e - normal, e + normal])
            }
        }
    }
}

/// Drop repeated consecutive vertices and an explicit closing vertex
pub fn normalize_polygon(mut points: Vec<Point>) -> Vec<Point> {
    points.dedup_by(|a, b| a.distance(b) <= EPSILON);
    while points.len() > 1 {
        let (first, last) = (points[0], points[points.len() - 1]);
        if first.distance(&last) <= EPSILON {
            points.pop();
        } else {
            break;
        }
    }
    points
}

#[derive(Debug, Deserialize)]
struct BoardFile {
    #[serde(default)]
    layers: Vec<Layer>,
    #[serde(default)]
    net_classes: BTreeMap<String, String>,
    #[serde(default)]
    outline: Option<Shape>,
    #[serde(default)]
    cutouts: Vec<Shape>,
    #[serde(default)]
    features: Vec<FeatureRecord>,
}

#[derive(Debug, Deserialize)]
struct FeatureRecord {
    #[serde(default)]
    id: Option<FeatureId>,
    kind: FeatureKind,
    #[serde(default)]
    layer: Option<String>,
    #[serde(default)]
    layers: Vec<String>,
    #[serde(default)]
    net: Option<String>,
    shape: Shape,
    #[serde(default)]
    drill: Option<f64>,
}

/// In-memory board implementing [`FeatureProvider`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub layers: Vec<Layer>,
    pub features: Vec<Feature>,
    pub outline: Option<Vec<Point>>,
    pub cutouts: Vec<Vec<Point>>,
    pub net_classes: BTreeMap<String, String>,
}

impl BoardSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, IsoGuardError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, IsoGuardError> {
        let file: BoardFile = serde_json::from_str(json)
            .map_err(|e| IsoGuardError::Parse(format!("board: {}", e)))?;

        let mut board = BoardSnapshot {
            layers: file.layers,
            net_classes: file.net_classes,
            ..Default::default()
        };

        if let Some(shape) = file.outline {
            board.outline = Some(shape_polygon(&shape, "outline")?);
        }
        for (i, shape) in file.cutouts.iter().enumerate() {
            board
                .cutouts
                .push(shape_polygon(shape, &format!("cutout #{}", i))?);
        }

        let mut seen = HashSet::new();
        let mut next_id: FeatureId = file
            .features
            .iter()
            .filter_map(|f| f.id)
            .max()
            .unwrap_or(0)
            + 1;

        for (i, record) in file.features.into_iter().enumerate() {
            let id = match record.id {
                Some(id) => id,
                None => {
                    next_id += 1;
                    next_id - 1
                }
            };
            if !seen.insert(id) {
                return Err(IsoGuardError::Parse(format!(
                    "feature #{}: duplicate id {}",
                    i, id
                )));
            }
            board.features.push(feature_from_record(id, i, record)?);
        }

        if board.layers.is_empty() {
            board.layers = derive_layers(&board.features);
        }

        Ok(board)
    }

    pub fn with_layer(mut self, name: &str, z_mm: f64) -> Self {
        self.layers.push(Layer {
            name: name.to_string(),
            z_mm,
        });
        self
    }

    pub fn add_feature(&mut self, feature: Feature) -> FeatureId {
        let id = feature.id;
        if !self.layers.iter().any(|l| feature.on_layer(&l.name)) {
            self.layers.push(Layer {
                name: feature.layer.clone(),
                z_mm: 0.0,
            });
        }
        self.features.push(feature);
        id
    }

    pub fn set_outline(&mut self, outline: Vec<Point>) {
        self.outline = Some(normalize_polygon(outline));
    }

    pub fn add_cutout(&mut self, cutout: Vec<Point>) {
        self.cutouts.push(normalize_polygon(cutout));
    }

    pub fn set_net_class(&mut self, net: &str, class: &str) {
        self.net_classes.insert(net.to_string(), class.to_string());
    }
}

fn shape_polygon(shape: &Shape, what: &str) -> Result<Vec<Point>, IsoGuardError> {
    let points = shape
        .to_geometry()
        .map_err(|e| IsoGuardError::Parse(format!("{}: {}", what, e)))?;
    if points.len() < 3 {
        return Err(IsoGuardError::Parse(format!(
            "{}: needs at least 3 vertices",
            what
        )));
    }
    Ok(points)
}

fn feature_from_record(
    id: FeatureId,
    index: usize,
    record: FeatureRecord,
) -> Result<Feature, IsoGuardError> {
    let err = |msg: String| IsoGuardError::Parse(format!("feature #{}: {}", index, msg));

    let geometry = record.shape.to_geometry().map_err(err)?;

    let via = if record.kind == FeatureKind::Via {
        if record.layers.len() < 2 {
            return Err(err("via must list at least two layers".to_string()));
        }
        let drill = record
            .drill
            .filter(|d| *d > 0.0)
            .ok_or_else(|| err("via needs a positive drill".to_string()))?;
        Some(ViaSpan {
            layers: record.layers.clone(),
            drill,
        })
    } else {
        None
    };

    let layer = record
        .layer
        .or_else(|| record.layers.first().cloned())
        .ok_or_else(|| err("missing layer".to_string()))?;

    Ok(Feature {
        id,
        kind: record.kind,
        layer,
        net: record.net,
        geometry,
        via,
    })
}

fn derive_layers(features: &[Feature]) -> Vec<Layer> {
    let mut layers: Vec<Layer> = Vec::new();
    let names = features.iter().flat_map(|f| {
        std::iter::once(f.layer.as_str()).chain(
            f.via
                .iter()
                .flat_map(|v| v.layers.iter().map(String::as_str)),
        )
    });
    for name in names {
        if !layers.iter().any(|l| l.name == name) {
            layers.push(Layer {
                name: name.to_string(),
                z_mm: 0.0,
            });
        }
    }
    layers
}

impl FeatureProvider for BoardSnapshot {
    fn layers(&self) -> &[Layer] {
        &self.layers
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn outline(&self) -> Option<&[Point]> {
        self.outline.as_deref()
    }

    fn cutouts(&self) -> &[Vec<Point>] {
        &self.cutouts
    }

    fn net_class(&self, net: &str) -> Option<&str> {
        self.net_classes.get(net).map(String::as_str)
    }
}
