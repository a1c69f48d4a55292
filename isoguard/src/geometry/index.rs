//! R-tree over bounding boxes
//!
//! Entries carry a `slot`, the position of the indexed item in whatever
//! slice the caller built the tree from.

use rstar::{Envelope, RTree, RTreeObject, AABB};

use super::{BBox, Point};

#[derive(Clone, Debug)]
pub struct IndexedBox {
    pub slot: usize,
    pub bounds: AABB<[f64; 2]>,
}

impl IndexedBox {
    pub fn new(slot: usize, bbox: BBox) -> Self {
        Self {
            slot,
            bounds: bbox.to_aabb(),
        }
    }
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

impl rstar::PointDistance for IndexedBox {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bounds.distance_2(point)
    }
}

impl BBox {
    pub fn to_aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_x, self.min_y], [self.max_x, self.max_y])
    }
}

/// Index every box that exists, keeping its position in `boxes`
pub fn index_boxes(boxes: impl IntoIterator<Item = Option<BBox>>) -> RTree<IndexedBox> {
    let entries: Vec<IndexedBox> = boxes
        .into_iter()
        .enumerate()
        .filter_map(|(slot, bbox)| bbox.map(|b| IndexedBox::new(slot, b)))
        .collect();
    RTree::bulk_load(entries)
}

/// Slots whose boxes touch `region`, ascending
pub fn slots_in(tree: &RTree<IndexedBox>, region: &BBox) -> Vec<usize> {
    let mut slots: Vec<usize> = tree
        .locate_in_envelope_intersecting(&region.to_aabb())
        .map(|e| e.slot)
        .collect();
    slots.sort_unstable();
    slots
}

/// Up to `k` slots by box distance from `p`, nearest first
pub fn nearest_slots(tree: &RTree<IndexedBox>, p: Point, k: usize) -> Vec<usize> {
    tree.nearest_neighbor_iter(&[p.x, p.y])
        .take(k)
        .map(|e| e.slot)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f64, y: f64) -> Option<BBox> {
        Some(BBox::of_segment(Point::new(x, y), Point::new(x + 1.0, y + 1.0)))
    }

    #[test]
    fn test_region_query_matches_linear_scan() {
        let boxes: Vec<Option<BBox>> = (0..40)
            .map(|i| {
                if i % 7 == 3 {
                    None
                } else {
                    unit_box((i % 8) as f64 * 3.0, (i / 8) as f64 * 3.0)
                }
            })
            .collect();
        let tree = index_boxes(boxes.iter().copied());
        let region = BBox::of_segment(Point::new(2.5, 2.5), Point::new(10.0, 7.0));

        let linear: Vec<usize> = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some_and(|b| b.intersects(&region)))
            .map(|(i, _)| i)
            .collect();
        assert!(!linear.is_empty());
        assert_eq!(slots_in(&tree, &region), linear);
    }

    #[test]
    fn test_nearest_slots_order() {
        let tree = index_boxes([unit_box(10.0, 0.0), unit_box(2.0, 0.0), None, unit_box(5.0, 0.0)]);
        assert_eq!(nearest_slots(&tree, Point::new(0.0, 0.5), 2), vec![1, 3]);
        assert_eq!(nearest_slots(&tree, Point::new(0.0, 0.5), 10).len(), 3);
    }
}
