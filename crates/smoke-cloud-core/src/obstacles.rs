//! Reference collision collaborator: static boxes in an R*-tree, and a cell
//! factory that raises a cell's contact flag when its box overlaps one.

use crate::cell::{BlockSignal, CellFactory, CellTemplate, ContactFlag};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// Axis-aligned box another object occupies.
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub id: u32,
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Obstacle {
    pub fn new(id: u32, min: [f64; 3], max: [f64; 3]) -> Self {
        Self { id, min, max }
    }

    /// Box of edge lengths `size` centered on `center`.
    pub fn centered(id: u32, center: [f64; 3], size: [f64; 3]) -> Self {
        Self {
            id,
            min: [
                center[0] - size[0] / 2.0,
                center[1] - size[1] / 2.0,
                center[2] - size[2] / 2.0,
            ],
            max: [
                center[0] + size[0] / 2.0,
                center[1] + size[1] / 2.0,
                center[2] + size[2] / 2.0,
            ],
        }
    }
}

impl RTreeObject for Obstacle {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

pub struct ObstacleField {
    tree: RTree<Obstacle>,
}

impl Default for ObstacleField {
    fn default() -> Self {
        Self { tree: RTree::new() }
    }
}

impl ObstacleField {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self {
            tree: RTree::bulk_load(obstacles),
        }
    }

    pub fn insert(&mut self, obstacle: Obstacle) {
        self.tree.insert(obstacle);
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Whether a box of half edge `half_extent` around `center` overlaps any
    /// obstacle. Shared faces count as contact.
    pub fn touches(&self, center: [f64; 3], half_extent: f64) -> bool {
        let envelope = AABB::from_corners(
            [
                center[0] - half_extent,
                center[1] - half_extent,
                center[2] - half_extent,
            ],
            [
                center[0] + half_extent,
                center[1] + half_extent,
                center[2] + half_extent,
            ],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .next()
            .is_some()
    }
}

/// Handle issued by `ObstacleFactory`.
#[derive(Clone, Debug)]
pub struct TrackedCell {
    pub id: u64,
    pub position: [f64; 3],
    contact: ContactFlag,
}

impl BlockSignal for TrackedCell {
    fn is_blocked(&self) -> bool {
        self.contact.is_raised()
    }
}

#[derive(Clone, Debug)]
struct LiveCell {
    position: [f64; 3],
    half_extent: f64,
    contact: ContactFlag,
}

/// Cell factory backed by an `ObstacleField`. Keeps a registry of live cells
/// so leaks and double frees are observable.
#[derive(Default)]
pub struct ObstacleFactory {
    field: ObstacleField,
    live: HashMap<u64, LiveCell>,
    next_id: u64,
    instantiated: usize,
    destroyed: usize,
    double_destroys: usize,
    template_releases: usize,
}

impl ObstacleFactory {
    pub fn new(field: ObstacleField) -> Self {
        Self {
            field,
            ..Self::default()
        }
    }

    pub fn field(&self) -> &ObstacleField {
        &self.field
    }

    /// Add an obstacle and raise the contact flag of every live cell it
    /// overlaps.
    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.field.insert(obstacle);
        self.refresh_contacts();
    }

    pub fn refresh_contacts(&mut self) {
        for cell in self.live.values() {
            if !cell.contact.is_raised() && self.field.touches(cell.position, cell.half_extent) {
                cell.contact.raise();
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn instantiated(&self) -> usize {
        self.instantiated
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed
    }

    pub fn double_destroys(&self) -> usize {
        self.double_destroys
    }

    pub fn template_releases(&self) -> usize {
        self.template_releases
    }

    pub fn blocked_count(&self) -> usize {
        self.live
            .values()
            .filter(|cell| cell.contact.is_raised())
            .count()
    }
}

impl CellFactory for ObstacleFactory {
    type Handle = TrackedCell;

    fn instantiate(&mut self, template: &CellTemplate, position: [f64; 3]) -> TrackedCell {
        let id = self.next_id;
        self.next_id += 1;
        self.instantiated += 1;

        let half_extent = template.half_extent();
        let contact = ContactFlag::new();
        if self.field.touches(position, half_extent) {
            contact.raise();
        }
        self.live.insert(
            id,
            LiveCell {
                position,
                half_extent,
                contact: contact.clone(),
            },
        );
        TrackedCell {
            id,
            position,
            contact,
        }
    }

    fn destroy(&mut self, handle: TrackedCell) {
        if self.live.remove(&handle.id).is_some() {
            self.destroyed += 1;
        } else {
            self.double_destroys += 1;
        }
    }

    fn release_template(&mut self) {
        self.template_releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CloudConfig;

    #[test]
    fn touches_detects_overlap_only_near_obstacles() {
        let field = ObstacleField::new(vec![Obstacle::new(0, [2.0, 0.0, -1.0], [3.0, 2.0, 1.0])]);
        assert_eq!(field.len(), 1);
        assert!(field.touches([1.6, 0.5, 0.0], 0.475));
        assert!(!field.touches([0.0, 0.5, 0.0], 0.475));
        assert!(!field.touches([1.0, 0.5, 0.0], 0.475));
    }

    #[test]
    fn empty_field_touches_nothing() {
        let field = ObstacleField::default();
        assert!(field.is_empty());
        assert!(!field.touches([0.0; 3], 10.0));
    }

    #[test]
    fn factory_raises_contact_for_overlapping_cells() {
        let field = ObstacleField::new(vec![Obstacle::centered(7, [1.0, 0.5, 0.0], [1.0; 3])]);
        let mut factory = ObstacleFactory::new(field);
        let template = CellTemplate::from_config(&CloudConfig::default());

        let free = factory.instantiate(&template, [-1.0, 0.5, 0.0]);
        let stuck = factory.instantiate(&template, [1.0, 0.5, 0.0]);
        assert!(!free.is_blocked());
        assert!(stuck.is_blocked());
        assert_eq!(factory.live_count(), 2);
        assert_eq!(factory.blocked_count(), 1);

        factory.destroy(free.clone());
        factory.destroy(free);
        assert_eq!(factory.destroyed(), 1);
        assert_eq!(factory.double_destroys(), 1);
        assert_eq!(factory.live_count(), 1);
    }

    #[test]
    fn added_obstacle_blocks_existing_cells() {
        let mut factory = ObstacleFactory::default();
        let template = CellTemplate::from_config(&CloudConfig::default());
        let cell = factory.instantiate(&template, [0.0, 0.5, 0.0]);
        assert!(!cell.is_blocked());

        factory.add_obstacle(Obstacle::centered(1, [0.0, 1.0, 0.0], [0.5; 3]));
        assert!(cell.is_blocked());
        assert_eq!(factory.field().len(), 1);
    }
}
