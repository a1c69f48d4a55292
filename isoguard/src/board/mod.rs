//! Board data model and the `FeatureProvider` seam
//!
//! The engine only reads boards through [`FeatureProvider`]. The JSON-backed
//! [`BoardSnapshot`] is the provider used by the CLI and the tests.

pub mod snapshot;

use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Point};

pub use snapshot::{BoardSnapshot, Shape};

pub type FeatureId = u64;

/// Kind of conductive feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Pad,
    Track,
    Zone,
    Via,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FeatureKind::Pad => "pad",
            FeatureKind::Track => "track",
            FeatureKind::Zone => "zone",
            FeatureKind::Via => "via",
        };
        f.write_str(s)
    }
}

/// Layers a via barrel connects, plus its drill diameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViaSpan {
    pub layers: Vec<String>,
    pub drill: f64,
}

/// A copper layer and its depth in the stackup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    /// Distance from the top surface in mm, used for 3D clearance
    #[serde(default)]
    pub z_mm: f64,
}

/// A piece of conductive geometry
///
/// `geometry` holds one point for position-only features and a closed
/// polygon (no repeated closing vertex) otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub layer: String,
    pub net: Option<String>,
    pub geometry: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<ViaSpan>,
}

impl Feature {
    pub fn new(
        id: FeatureId,
        kind: FeatureKind,
        layer: impl Into<String>,
        net: Option<&str>,
        geometry: Vec<Point>,
    ) -> Self {
        Self {
            id,
            kind,
            layer: layer.into(),
            net: net.map(str::to_string),
            geometry,
            via: None,
        }
    }

    /// A via spanning `layers`, primary layer is the first one
    pub fn via(
        id: FeatureId,
        layers: &[&str],
        net: Option<&str>,
        outline: Vec<Point>,
        drill: f64,
    ) -> Self {
        let layers: Vec<String> = layers.iter().map(|l| l.to_string()).collect();
        Self {
            id,
            kind: FeatureKind::Via,
            layer: layers.first().cloned().unwrap_or_default(),
            net: net.map(str::to_string),
            geometry: outline,
            via: Some(ViaSpan { layers, drill }),
        }
    }

    pub fn is_point(&self) -> bool {
        self.geometry.len() == 1
    }

    pub fn is_polygon(&self) -> bool {
        self.geometry.len() >= 3
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.geometry)
    }

    /// Representative location: the point itself or the bbox center
    pub fn anchor(&self) -> Option<Point> {
        if self.is_point() {
            return self.geometry.first().copied();
        }
        self.bbox().map(|b| b.center())
    }

    pub fn on_layer(&self, layer: &str) -> bool {
        self.layer == layer
            || self
                .via
                .as_ref()
                .is_some_and(|v| v.layers.iter().any(|l| l == layer))
    }

    /// Whether this via connects both layers
    pub fn bridges(&self, a: &str, b: &str) -> bool {
        self.via.is_some() && self.on_layer(a) && self.on_layer(b)
    }
}

/// Typed read-only access to a board
///
/// The engine depends only on this trait, never on a concrete board
/// representation.
pub trait FeatureProvider: Sync {
    fn layers(&self) -> &[Layer];

    fn features(&self) -> &[Feature];

    fn outline(&self) -> Option<&[Point]>;

    fn cutouts(&self) -> &[Vec<Point>];

    /// Net class tag attached to a net, if the board carries one
    fn net_class(&self, net: &str) -> Option<&str>;

    fn features_on_layer<'a>(&'a self, layer: &str) -> Vec<&'a Feature> {
        self.features().iter().filter(|f| f.on_layer(layer)).collect()
    }

    fn layer_depth(&self, layer: &str) -> Option<f64> {
        self.layers().iter().find(|l| l.name == layer).map(|l| l.z_mm)
    }

    /// Distinct net names, sorted
    fn nets(&self) -> Vec<&str> {
        let mut nets: Vec<&str> = self
            .features()
            .iter()
            .filter_map(|f| f.net.as_deref())
            .collect();
        nets.sort_unstable();
        nets.dedup();
        nets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_via_is_on_every_spanned_layer() {
        let via = Feature::via(
            3,
            &["F.Cu", "In1.Cu", "B.Cu"],
            Some("GND"),
            vec![Point::new(0.0, 0.0)],
            0.3,
        );
        assert_eq!(via.layer, "F.Cu");
        assert!(via.on_layer("In1.Cu"));
        assert!(via.bridges("F.Cu", "B.Cu"));
        assert!(!via.on_layer("In2.Cu"));
    }

    #[test]
    fn test_pad_does_not_bridge() {
        let pad = Feature::new(
            1,
            FeatureKind::Pad,
            "F.Cu",
            Some("VIN"),
            vec![Point::new(0.0, 0.0)],
        );
        assert!(pad.is_point());
        assert!(!pad.bridges("F.Cu", "F.Cu"));
        assert_eq!(pad.anchor(), Some(Point::new(0.0, 0.0)));
    }
}
