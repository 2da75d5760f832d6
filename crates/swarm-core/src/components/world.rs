//! World Components
//!
//! The bounded grid with its resources and hazards. Each cell hosts at most
//! one resource and at most one hazard; both maps are keyed by cell so the
//! occupancy invariant holds by construction and placement is checked.

use bevy_ecs::prelude::*;
use rand::Rng;
use std::collections::BTreeMap;

use swarm_events::{Cell, ItemSnapshot};

/// Fixed per-tick velocity of a mobile item. Components are in {-1, 0, 1}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mobility {
    pub dx: i32,
    pub dy: i32,
}

/// A collectible resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSite {
    pub value: f64,
    pub mobility: Option<Mobility>,
}

/// A hazard agents are penalized for touching
#[derive(Debug, Clone, PartialEq)]
pub struct HazardSite {
    pub severity: f64,
    pub mobility: Option<Mobility>,
}

/// Why a world mutation was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupancyError {
    OutOfBounds(Cell),
    ResourceAlreadyAt(Cell),
    HazardAlreadyAt(Cell),
}

impl std::fmt::Display for OccupancyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OccupancyError::OutOfBounds(c) => write!(f, "cell {} is outside the world", c),
            OccupancyError::ResourceAlreadyAt(c) => write!(f, "cell {} already holds a resource", c),
            OccupancyError::HazardAlreadyAt(c) => write!(f, "cell {} already holds a hazard", c),
        }
    }
}

/// What an agent found on the cell it moved into
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Contact {
    pub collected: Option<f64>,
    pub hazard: Option<f64>,
    pub hazard_removed: bool,
}

/// Resource: the grid. Owned by the engine for the lifetime of a run.
#[derive(Resource, Debug, Clone)]
pub struct GridWorld {
    size: u32,
    resources: BTreeMap<Cell, ResourceSite>,
    hazards: BTreeMap<Cell, HazardSite>,
}

impl GridWorld {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            resources: BTreeMap::new(),
            hazards: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        let max = self.size as i32;
        cell.x >= 0 && cell.y >= 0 && cell.x < max && cell.y < max
    }

    /// Clamps a cell into the world.
    pub fn clamp(&self, cell: Cell) -> Cell {
        let max = self.size as i32 - 1;
        Cell::new(cell.x.clamp(0, max), cell.y.clamp(0, max))
    }

    pub fn resource_at(&self, cell: Cell) -> Option<&ResourceSite> {
        self.resources.get(&cell)
    }

    pub fn hazard_at(&self, cell: Cell) -> Option<&HazardSite> {
        self.hazards.get(&cell)
    }

    pub fn resources(&self) -> impl Iterator<Item = (&Cell, &ResourceSite)> {
        self.resources.iter()
    }

    pub fn hazards(&self) -> impl Iterator<Item = (&Cell, &HazardSite)> {
        self.hazards.iter()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn hazard_count(&self) -> usize {
        self.hazards.len()
    }

    /// Resources within `radius` (Chebyshev) of `center`, in cell order.
    pub fn resources_within(&self, center: Cell, radius: u32) -> Vec<(Cell, &ResourceSite)> {
        self.resources
            .iter()
            .filter(|(cell, _)| cell.chebyshev(&center) <= radius)
            .map(|(cell, site)| (*cell, site))
            .collect()
    }

    /// Hazards within `radius` (Chebyshev) of `center`, in cell order.
    pub fn hazards_within(&self, center: Cell, radius: u32) -> Vec<(Cell, &HazardSite)> {
        self.hazards
            .iter()
            .filter(|(cell, _)| cell.chebyshev(&center) <= radius)
            .map(|(cell, site)| (*cell, site))
            .collect()
    }

    pub(crate) fn place_resource(
        &mut self,
        cell: Cell,
        site: ResourceSite,
    ) -> Result<(), OccupancyError> {
        if !self.in_bounds(cell) {
            return Err(OccupancyError::OutOfBounds(cell));
        }
        if self.resources.contains_key(&cell) {
            return Err(OccupancyError::ResourceAlreadyAt(cell));
        }
        self.resources.insert(cell, site);
        Ok(())
    }

    pub(crate) fn place_hazard(&mut self, cell: Cell, site: HazardSite) -> Result<(), OccupancyError> {
        if !self.in_bounds(cell) {
            return Err(OccupancyError::OutOfBounds(cell));
        }
        if self.hazards.contains_key(&cell) {
            return Err(OccupancyError::HazardAlreadyAt(cell));
        }
        self.hazards.insert(cell, site);
        Ok(())
    }

    /// Removes and returns the value of the resource at `cell`.
    pub(crate) fn collect(&mut self, cell: Cell) -> Option<f64> {
        self.resources.remove(&cell).map(|site| site.value)
    }

    pub(crate) fn remove_hazard(&mut self, cell: Cell) -> Option<HazardSite> {
        self.hazards.remove(&cell)
    }

    /// Resolves an agent ending its move on `cell`: any resource is
    /// collected, any hazard hits and is removed with `removal_probability`.
    pub(crate) fn touch<R: Rng>(&mut self, cell: Cell, removal_probability: f64, rng: &mut R) -> Contact {
        let collected = self.collect(cell);
        let hazard = self.hazards.get(&cell).map(|h| h.severity);
        let hazard_removed = hazard.is_some()
            && rng.gen::<f64>() < removal_probability
            && self.remove_hazard(cell).is_some();
        Contact { collected, hazard, hazard_removed }
    }

    /// Advances every mobile item one step. Items bounce off the walls; an
    /// item that would land on another item of the same kind reverses
    /// direction and stays put this tick. Items are moved in cell order.
    pub(crate) fn advance_mobile(&mut self) {
        let movers: Vec<Cell> = self
            .resources
            .iter()
            .filter(|(_, s)| s.mobility.is_some())
            .map(|(c, _)| *c)
            .collect();
        for cell in movers {
            let Some(mut site) = self.resources.remove(&cell) else {
                continue;
            };
            let Some(mobility) = site.mobility else {
                self.resources.insert(cell, site);
                continue;
            };
            let (target, bounced) = self.reflect(cell, mobility);
            if self.resources.contains_key(&target) {
                site.mobility = Some(Mobility { dx: -mobility.dx, dy: -mobility.dy });
                self.resources.insert(cell, site);
            } else {
                site.mobility = Some(bounced);
                self.resources.insert(target, site);
            }
        }

        let movers: Vec<Cell> = self
            .hazards
            .iter()
            .filter(|(_, s)| s.mobility.is_some())
            .map(|(c, _)| *c)
            .collect();
        for cell in movers {
            let Some(mut site) = self.hazards.remove(&cell) else {
                continue;
            };
            let Some(mobility) = site.mobility else {
                self.hazards.insert(cell, site);
                continue;
            };
            let (target, bounced) = self.reflect(cell, mobility);
            if self.hazards.contains_key(&target) {
                site.mobility = Some(Mobility { dx: -mobility.dx, dy: -mobility.dy });
                self.hazards.insert(cell, site);
            } else {
                site.mobility = Some(bounced);
                self.hazards.insert(target, site);
            }
        }
    }

    /// Next cell for an item at `cell`, reflecting each axis off the walls.
    fn reflect(&self, cell: Cell, mobility: Mobility) -> (Cell, Mobility) {
        let max = self.size as i32 - 1;
        let axis = |pos: i32, vel: i32| -> (i32, i32) {
            let next = pos + vel;
            if next < 0 || next > max {
                let flipped = -vel;
                ((pos + flipped).clamp(0, max), flipped)
            } else {
                (next, vel)
            }
        };
        let (x, dx) = axis(cell.x, mobility.dx);
        let (y, dy) = axis(cell.y, mobility.dy);
        (Cell::new(x, y), Mobility { dx, dy })
    }

    /// First cell found holding an item outside the bounds, if any.
    pub(crate) fn find_out_of_bounds(&self) -> Option<Cell> {
        self.resources
            .keys()
            .chain(self.hazards.keys())
            .copied()
            .find(|c| !self.in_bounds(*c))
    }

    pub fn resource_snapshots(&self) -> Vec<ItemSnapshot> {
        self.resources
            .iter()
            .map(|(cell, site)| ItemSnapshot {
                position: *cell,
                magnitude: site.value,
                mobile: site.mobility.is_some(),
            })
            .collect()
    }

    pub fn hazard_snapshots(&self) -> Vec<ItemSnapshot> {
        self.hazards
            .iter()
            .map(|(cell, site)| ItemSnapshot {
                position: *cell,
                magnitude: site.severity,
                mobile: site.mobility.is_some(),
            })
            .collect()
    }
}
