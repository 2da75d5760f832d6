//! World Setup
//!
//! Deterministic placement of resources and hazards from the run RNG.

use rand::rngs::SmallRng;
use rand::seq::index;
use rand::Rng;

use swarm_events::Cell;

use crate::components::world::{GridWorld, HazardSite, Mobility, ResourceSite};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::strategy::Direction;

/// Row-major cell for a flat index.
fn cell_at(index: usize, size: u32) -> Cell {
    let size = size as usize;
    Cell::new((index % size) as i32, (index / size) as i32)
}

fn random_mobility(rng: &mut SmallRng, mobile_fraction: f64) -> Option<Mobility> {
    if mobile_fraction <= 0.0 || !rng.gen_bool(mobile_fraction) {
        return None;
    }
    let (dx, dy) = Direction::MOVES[rng.gen_range(0..Direction::MOVES.len())].delta();
    Some(Mobility { dx, dy })
}

/// Builds a grid with `resource_count` resources and `hazard_count` hazards
/// on distinct cells. `tick` is only used to label a placement failure.
pub fn populate_world(config: &SimConfig, rng: &mut SmallRng, tick: u64) -> Result<GridWorld, SimError> {
    let mut grid = GridWorld::new(config.world_size);
    let wanted = config.resource_count + config.hazard_count;
    let picks = index::sample(rng, config.cell_count(), wanted);

    for (n, flat) in picks.iter().enumerate() {
        let cell = cell_at(flat, config.world_size);
        let mobility = random_mobility(rng, config.world.mobile_fraction);
        let placed = if n < config.resource_count {
            grid.place_resource(
                cell,
                ResourceSite { value: config.world.resource_value, mobility },
            )
        } else {
            grid.place_hazard(
                cell,
                HazardSite { severity: config.world.hazard_severity, mobility },
            )
        };
        placed.map_err(|e| SimError::invariant(tick, None, format!("world placement failed: {}", e)))?;
    }

    tracing::debug!(
        resources = grid.resource_count(),
        hazards = grid.hazard_count(),
        "populated world"
    );
    Ok(grid)
}

/// Random cell without a hazard. Falls back to a scan, then to any cell,
/// when the grid is nearly covered in hazards.
pub fn random_open_cell(grid: &GridWorld, rng: &mut SmallRng) -> Cell {
    let size = grid.size() as i32;
    for _ in 0..64 {
        let cell = Cell::new(rng.gen_range(0..size), rng.gen_range(0..size));
        if grid.hazard_at(cell).is_none() {
            return cell;
        }
    }
    (0..size)
        .flat_map(|y| (0..size).map(move |x| Cell::new(x, y)))
        .find(|cell| grid.hazard_at(*cell).is_none())
        .unwrap_or(Cell::new(0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_population_counts_and_bounds() {
        let config = SimConfig { resource_count: 12, hazard_count: 7, ..SimConfig::default() };
        let mut rng = SmallRng::seed_from_u64(3);
        let grid = populate_world(&config, &mut rng, 0).unwrap();
        assert_eq!(grid.resource_count(), 12);
        assert_eq!(grid.hazard_count(), 7);
        assert!(grid.find_out_of_bounds().is_none());
        // Resources and hazards never start on the same cell
        assert!(grid.resources().all(|(cell, _)| grid.hazard_at(*cell).is_none()));
        assert!(grid.resources().all(|(_, site)| site.value == 10.0 && site.mobility.is_none()));
    }

    #[test]
    fn test_population_is_deterministic() {
        let mut config = SimConfig::default();
        config.world.mobile_fraction = 0.5;
        let a = populate_world(&config, &mut SmallRng::seed_from_u64(11), 0).unwrap();
        let b = populate_world(&config, &mut SmallRng::seed_from_u64(11), 0).unwrap();
        assert_eq!(a.resource_snapshots(), b.resource_snapshots());
        assert_eq!(a.hazard_snapshots(), b.hazard_snapshots());
    }

    #[test]
    fn test_full_world_placement() {
        let config = SimConfig {
            world_size: 3,
            resource_count: 5,
            hazard_count: 4,
            ..SimConfig::default()
        };
        let mut rng = SmallRng::seed_from_u64(8);
        let grid = populate_world(&config, &mut rng, 0).unwrap();
        assert_eq!(grid.resource_count() + grid.hazard_count(), 9);
        // Every cell without a hazard holds a resource
        let open = random_open_cell(&grid, &mut rng);
        assert!(grid.hazard_at(open).is_none());
        assert!(grid.resource_at(open).is_some());
    }
}
