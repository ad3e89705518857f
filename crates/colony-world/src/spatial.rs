//! Spatial helpers over [`Position`]s.

use colony_types::{Position, Terrain};

use crate::provider::World;

/// Edge length of every region grid.
pub const GRID_SIZE: u8 = 50;

/// Range between two positions, `None` if they lie in different locations.
pub fn range(a: &Position, b: &Position) -> Option<u32> {
    a.range_to(b)
}

/// The up-to-eight in-grid cells surrounding `center`.
pub fn neighbors(center: &Position) -> Vec<Position> {
    let mut cells = Vec::with_capacity(8);
    for dx in -1_i16..=1 {
        for dy in -1_i16..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let x = i16::from(center.x).saturating_add(dx);
            let y = i16::from(center.y).saturating_add(dy);
            let (Ok(x), Ok(y)) = (u8::try_from(x), u8::try_from(y)) else {
                continue;
            };
            if x < GRID_SIZE && y < GRID_SIZE {
                cells.push(Position {
                    location: center.location.clone(),
                    x,
                    y,
                });
            }
        }
    }
    cells
}

/// Number of cells around `center` that are not permanently blocked.
///
/// Cells beyond the grid edge count as blocked.
pub fn open_neighbor_count<W: World + ?Sized>(world: &W, center: &Position) -> u32 {
    let open = neighbors(center)
        .iter()
        .filter(|cell| world.terrain(cell) != Terrain::Wall)
        .count();
    u32::try_from(open).unwrap_or(u32::MAX)
}

/// Pick the candidate closest to `origin`.
///
/// Candidates in other locations are ignored. Ties keep the earlier
/// candidate, so callers control tie-breaking through input order.
pub fn closest_by_range<'a, T, F>(origin: &Position, candidates: &'a [T], position_of: F) -> Option<&'a T>
where
    F: Fn(&T) -> &Position,
{
    let mut best: Option<(&T, u32)> = None;
    for candidate in candidates {
        let Some(distance) = origin.range_to(position_of(candidate)) else {
            continue;
        };
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((candidate, distance)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_cell_has_eight_neighbors() {
        let center = Position::new("W1N1", 10, 10);
        assert_eq!(neighbors(&center).len(), 8);
    }

    #[test]
    fn corner_cell_has_three_neighbors() {
        let corner = Position::new("W1N1", 0, 0);
        assert_eq!(neighbors(&corner).len(), 3);
        let far = Position::new("W1N1", GRID_SIZE - 1, GRID_SIZE - 1);
        assert_eq!(neighbors(&far).len(), 3);
    }

    #[test]
    fn closest_prefers_first_on_tie() {
        let origin = Position::new("W1N1", 10, 10);
        let cells = vec![
            Position::new("W1N1", 12, 10),
            Position::new("W1N1", 8, 10),
            Position::new("W1N1", 20, 20),
        ];
        let picked = closest_by_range(&origin, &cells, |p| p);
        assert_eq!(picked, cells.first());
    }

    #[test]
    fn closest_skips_other_locations() {
        let origin = Position::new("W1N1", 10, 10);
        let cells = vec![Position::new("W2N1", 10, 10), Position::new("W1N1", 40, 40)];
        let picked = closest_by_range(&origin, &cells, |p| p);
        assert_eq!(picked, cells.get(1));
    }
}
