//! Default starting colony used by the engine binary and integration tests.
//!
//! A single region, `W1N1`, with two extraction nodes (each with a
//! container next to it), a central storage, a link near the controller,
//! and one facility. Node A is hemmed in by a wall row and has five open
//! neighbours; node B sits in a wall pocket and has three.

use colony_types::{FacilityId, LocationId, NodeId, Position, SiteId, SiteKind};

use crate::error::WorldError;
use crate::sim::SimWorld;

/// Name of the starting region.
pub const STARTING_LOCATION: &str = "W1N1";

/// Handles of every entity placed by [`create_starting_colony`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartingColonyIds {
    /// The starting region.
    pub location: LocationId,
    /// Extraction node with five open neighbours.
    pub node_a: NodeId,
    /// Extraction node with three open neighbours.
    pub node_b: NodeId,
    /// Container next to node A.
    pub container_a: SiteId,
    /// Container next to node B.
    pub container_b: SiteId,
    /// Central storage.
    pub storage: SiteId,
    /// Link next to the controller.
    pub link: SiteId,
    /// The only facility.
    pub facility: FacilityId,
}

fn at(x: u8, y: u8) -> Position {
    Position::new(STARTING_LOCATION, x, y)
}

/// Build the starting colony.
///
/// # Errors
///
/// Returns [`WorldError`] if any placement fails (only possible if the
/// layout constants are edited out of the grid).
pub fn create_starting_colony() -> Result<(SimWorld, StartingColonyIds), WorldError> {
    let mut world = SimWorld::new();
    world.add_location(STARTING_LOCATION)?;

    // Node A: wall row above.
    for x in 9..=11 {
        world.add_wall(&at(x, 9))?;
    }
    let node_a = world.add_node(at(10, 10), 3000)?;
    let container_a = world.add_site(SiteKind::Container, at(11, 11), 0, 2000)?;

    // Node B: wall pocket, open only to the south.
    for (x, y) in [(39, 11), (40, 11), (41, 11), (39, 12), (41, 12)] {
        world.add_wall(&at(x, y))?;
    }
    let node_b = world.add_node(at(40, 12), 3000)?;
    let container_b = world.add_site(SiteKind::Container, at(40, 13), 0, 2000)?;

    // Swamp around the controller does not block anything.
    for x in 29..=31 {
        world.add_swamp(&at(x, 31))?;
    }

    let storage = world.add_site(SiteKind::Storage, at(25, 20), 5000, 1_000_000)?;
    let link = world.add_site(SiteKind::Link, at(30, 30), 0, 800)?;
    let facility = world.add_facility(at(25, 25), 1300, 20)?;

    let ids = StartingColonyIds {
        location: LocationId::from(STARTING_LOCATION),
        node_a,
        node_b,
        container_a,
        container_b,
        storage,
        link,
        facility,
    };
    Ok((world, ids))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::World;
    use crate::spatial::open_neighbor_count;

    #[test]
    fn starting_colony_has_expected_entities() {
        let (world, ids) = create_starting_colony().unwrap();
        assert_eq!(world.nodes_in(&ids.location).len(), 2);
        assert_eq!(world.sites_in(&ids.location).len(), 4);
        assert_eq!(
            world.primary_facility(&ids.location).map(|f| f.id),
            Some(ids.facility)
        );
    }

    #[test]
    fn node_capacities_follow_walls() {
        let (world, ids) = create_starting_colony().unwrap();
        let a = world.node(ids.node_a).unwrap();
        let b = world.node(ids.node_b).unwrap();
        assert_eq!(open_neighbor_count(&world, &a.position), 5);
        assert_eq!(open_neighbor_count(&world, &b.position), 3);
    }
}
