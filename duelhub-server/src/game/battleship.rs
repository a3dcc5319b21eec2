//! Battleship Boards
//!
//! Per-player 10×10 grids, ship geometry, and fleet legality.
//!
//! ## Fleet
//!
//! Every player places exactly ten ships:
//!
//! | Length | Count |
//! |--------|-------|
//! | 4      | 1     |
//! | 3      | 2     |
//! | 2      | 3     |
//! | 1      | 4     |
//!
//! Ships stay inside the grid, never share a cell, and never touch each
//! other, not even diagonally.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width and height of a grid.
pub const GRID_SIZE: usize = 10;

/// Required fleet as `(length, count)` pairs.
pub const FLEET: [(u8, usize); 4] = [(4, 1), (3, 2), (2, 3), (1, 4)];

/// Longest ship in the fleet.
pub const MAX_SHIP_LENGTH: u8 = 4;

/// Direction a ship extends from its origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Extends towards increasing `x`.
    Horizontal,
    /// Extends towards increasing `y`.
    Vertical,
}

/// A placed ship.
///
/// Coordinates are signed so that off-board placements survive decoding and
/// are rejected by [`validate_placement`] with a useful reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    /// Origin column.
    pub x: i32,
    /// Origin row.
    pub y: i32,
    /// Number of cells covered.
    pub length: u8,
    /// Direction from the origin.
    #[serde(rename = "direction", alias = "orientation")]
    pub orientation: Orientation,
    /// Cells of this ship that have been hit.
    #[serde(default)]
    pub hits: u8,
}

impl Ship {
    /// Create an undamaged ship.
    pub fn new(x: i32, y: i32, length: u8, orientation: Orientation) -> Self {
        Self {
            x,
            y,
            length,
            orientation,
            hits: 0,
        }
    }

    /// Cells covered by the ship, origin first.
    pub fn cells(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (0..i64::from(self.length)).map(move |i| match self.orientation {
            Orientation::Horizontal => (i64::from(self.x) + i, i64::from(self.y)),
            Orientation::Vertical => (i64::from(self.x), i64::from(self.y) + i),
        })
    }

    /// Whether `(x, y)` lies within the ship's footprint.
    pub fn covers(&self, x: i64, y: i64) -> bool {
        self.cells().any(|cell| cell == (x, y))
    }

    /// Whether every cell of the ship has been hit.
    pub fn is_sunk(&self) -> bool {
        self.hits >= self.length
    }
}

/// True iff every ship has been sunk.
pub fn all_sunk(ships: &[Ship]) -> bool {
    ships.iter().all(Ship::is_sunk)
}

/// Reasons a fleet is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Ship length outside `1..=4`.
    #[error("ship length {0} is not between 1 and 4")]
    ShipLength(u8),

    /// Ship extends past the grid edge.
    #[error("ship cell ({x}, {y}) is off the board")]
    OutOfBounds {
        /// Column of the offending cell.
        x: i64,
        /// Row of the offending cell.
        y: i64,
    },

    /// Two ships share a cell.
    #[error("ships overlap at ({x}, {y})")]
    Overlap {
        /// Column of the shared cell.
        x: i64,
        /// Row of the shared cell.
        y: i64,
    },

    /// Two ships are adjacent (including diagonally).
    #[error("ships touch at ({x}, {y})")]
    Touching {
        /// Column of the cell that touches another ship.
        x: i64,
        /// Row of the cell that touches another ship.
        y: i64,
    },

    /// Wrong number of ships of some length.
    #[error("expected {expected} ships of length {length}, found {found}")]
    FleetComposition {
        /// Ship length being counted.
        length: u8,
        /// Required count.
        expected: usize,
        /// Submitted count.
        found: usize,
    },
}

/// Check a fleet against the composition, bounds, overlap and spacing rules.
pub fn validate_placement(ships: &[Ship]) -> Result<(), PlacementError> {
    let mut counts = [0usize; MAX_SHIP_LENGTH as usize + 1];
    let mut owner: [[Option<usize>; GRID_SIZE]; GRID_SIZE] = [[None; GRID_SIZE]; GRID_SIZE];

    for (index, ship) in ships.iter().enumerate() {
        if ship.length == 0 || ship.length > MAX_SHIP_LENGTH {
            return Err(PlacementError::ShipLength(ship.length));
        }
        counts[ship.length as usize] += 1;

        for (x, y) in ship.cells() {
            let (cx, cy) = grid_index(x, y).ok_or(PlacementError::OutOfBounds { x, y })?;
            if owner[cy][cx].is_some() {
                return Err(PlacementError::Overlap { x, y });
            }
            for (nx, ny) in neighbours(cx, cy) {
                if matches!(owner[ny][nx], Some(other) if other != index) {
                    return Err(PlacementError::Touching { x, y });
                }
            }
            owner[cy][cx] = Some(index);
        }
    }

    for (length, expected) in FLEET {
        let found = counts[length as usize];
        if found != expected {
            return Err(PlacementError::FleetComposition {
                length,
                expected,
                found,
            });
        }
    }

    Ok(())
}

/// Convert signed coordinates to grid indices if they are on the board.
pub fn grid_index(x: i64, y: i64) -> Option<(usize, usize)> {
    let x = usize::try_from(x).ok().filter(|&x| x < GRID_SIZE)?;
    let y = usize::try_from(y).ok().filter(|&y| y < GRID_SIZE)?;
    Some((x, y))
}

/// On-board cells in the 3×3 block around `(x, y)`, the cell itself included.
fn neighbours(x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
    let xs = x.saturating_sub(1)..=(x + 1).min(GRID_SIZE - 1);
    let ys = y.saturating_sub(1)..=(y + 1).min(GRID_SIZE - 1);
    ys.flat_map(move |ny| xs.clone().map(move |nx| (nx, ny)))
}

/// State of one grid cell. Serialized as `""`, `"ship"`, `"hit"` or `"miss"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridCell {
    /// Open water, not yet fired at.
    #[default]
    #[serde(rename = "")]
    Empty,
    /// Part of a ship, not yet hit.
    Ship,
    /// Ship cell that has been hit.
    Hit,
    /// Open water that has been fired at.
    Miss,
}

impl GridCell {
    /// Whether this cell has already been fired at.
    pub fn is_resolved(self) -> bool {
        matches!(self, GridCell::Hit | GridCell::Miss)
    }
}

/// Row-major 10×10 grid, indexed `[y][x]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid([[GridCell; GRID_SIZE]; GRID_SIZE]);

impl Grid {
    /// Cell at `(x, y)`.
    pub fn get(&self, x: usize, y: usize) -> GridCell {
        self.0[y][x]
    }

    fn set(&mut self, x: usize, y: usize, cell: GridCell) {
        self.0[y][x] = cell;
    }

    /// Iterate over every cell.
    pub fn iter(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.0.iter().flatten().copied()
    }
}

/// Result of firing at an unresolved cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttackOutcome {
    /// Open water.
    Miss,
    /// A ship was hit but is still afloat.
    Hit,
    /// The hit sank a ship of the given length.
    Sunk {
        /// Length of the sunk ship.
        length: u8,
    },
}

impl AttackOutcome {
    /// Whether a ship was struck.
    pub fn is_hit(self) -> bool {
        !matches!(self, AttackOutcome::Miss)
    }
}

/// One player's side of a battleship game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBoard {
    /// Cell states.
    pub grid: Grid,
    /// Placed fleet.
    pub ships: Vec<Ship>,
    /// Whether the fleet has been placed.
    pub ready: bool,
}

impl PlayerBoard {
    /// Validate and install a fleet. On error the board is untouched.
    ///
    /// Client-supplied hit counters are discarded.
    pub fn place(&mut self, mut ships: Vec<Ship>) -> Result<(), PlacementError> {
        validate_placement(&ships)?;

        let mut grid = Grid::default();
        for ship in &mut ships {
            ship.hits = 0;
            for (x, y) in ship.cells() {
                if let Some((x, y)) = grid_index(x, y) {
                    grid.set(x, y, GridCell::Ship);
                }
            }
        }

        self.grid = grid;
        self.ships = ships;
        self.ready = true;
        Ok(())
    }

    /// Fire at `(x, y)`. Returns `None` without mutating if the cell was
    /// already fired at.
    pub fn strike(&mut self, x: usize, y: usize) -> Option<AttackOutcome> {
        match self.grid.get(x, y) {
            GridCell::Hit | GridCell::Miss => None,
            GridCell::Empty => {
                self.grid.set(x, y, GridCell::Miss);
                Some(AttackOutcome::Miss)
            }
            GridCell::Ship => {
                self.grid.set(x, y, GridCell::Hit);
                let (px, py) = (x as i64, y as i64);
                let outcome = match self.ships.iter_mut().find(|s| s.covers(px, py)) {
                    Some(ship) => {
                        ship.hits = ship.hits.saturating_add(1);
                        if ship.is_sunk() {
                            AttackOutcome::Sunk {
                                length: ship.length,
                            }
                        } else {
                            AttackOutcome::Hit
                        }
                    }
                    None => AttackOutcome::Hit,
                };
                Some(outcome)
            }
        }
    }

    /// Whether every placed ship has been sunk.
    pub fn all_sunk(&self) -> bool {
        all_sunk(&self.ships)
    }
}

/// A legal fleet occupying rows 0–4, leaving rows 5–9 open water.
#[cfg(test)]
pub(crate) fn legal_fleet() -> Vec<Ship> {
    use Orientation::Horizontal as H;
    vec![
        Ship::new(0, 0, 4, H),
        Ship::new(5, 0, 3, H),
        Ship::new(0, 2, 3, H),
        Ship::new(4, 2, 2, H),
        Ship::new(7, 2, 2, H),
        Ship::new(0, 4, 2, H),
        Ship::new(3, 4, 1, H),
        Ship::new(5, 4, 1, H),
        Ship::new(7, 4, 1, H),
        Ship::new(9, 4, 1, H),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_legal_fleet_accepted() {
        assert_eq!(validate_placement(&legal_fleet()), Ok(()));
    }

    #[test]
    fn test_vertical_fleet_accepted() {
        let fleet: Vec<Ship> = legal_fleet()
            .into_iter()
            .map(|s| Ship::new(s.y, s.x, s.length, Orientation::Vertical))
            .collect();
        assert_eq!(validate_placement(&fleet), Ok(()));
    }

    #[test]
    fn test_empty_fleet_rejected() {
        assert_eq!(
            validate_placement(&[]),
            Err(PlacementError::FleetComposition {
                length: 4,
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn test_missing_ship_rejected() {
        let mut fleet = legal_fleet();
        fleet.pop();
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::FleetComposition { length: 1, found: 3, .. })
        ));
    }

    #[test]
    fn test_extra_ship_rejected() {
        let mut fleet = legal_fleet();
        fleet.push(Ship::new(9, 9, 1, Orientation::Horizontal));
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::FleetComposition { length: 1, found: 5, .. })
        ));
    }

    #[test]
    fn test_bad_length_rejected() {
        let mut fleet = legal_fleet();
        fleet[0].length = 5;
        assert_eq!(validate_placement(&fleet), Err(PlacementError::ShipLength(5)));
        fleet[0].length = 0;
        assert_eq!(validate_placement(&fleet), Err(PlacementError::ShipLength(0)));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut fleet = legal_fleet();
        fleet[1] = Ship::new(8, 0, 3, Orientation::Horizontal);
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::OutOfBounds { x: 10, y: 0 })
        ));

        let mut fleet = legal_fleet();
        fleet[9] = Ship::new(-1, 9, 1, Orientation::Horizontal);
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::OutOfBounds { x: -1, y: 9 })
        ));
    }

    #[test]
    fn test_overlap_rejected() {
        let mut fleet = legal_fleet();
        fleet[9] = Ship::new(1, 0, 1, Orientation::Horizontal);
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::Overlap { x: 1, y: 0 })
        ));
    }

    #[test]
    fn test_diagonal_touch_rejected() {
        let mut fleet = legal_fleet();
        // Diagonal to the end of the length-4 ship at (3, 0).
        fleet[9] = Ship::new(4, 1, 1, Orientation::Horizontal);
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::Touching { .. })
        ));
    }

    #[test]
    fn test_huge_coordinates_do_not_overflow() {
        let mut fleet = legal_fleet();
        fleet[0] = Ship::new(i32::MAX, i32::MAX, 4, Orientation::Vertical);
        assert!(matches!(
            validate_placement(&fleet),
            Err(PlacementError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_ship_covers() {
        let ship = Ship::new(2, 3, 3, Orientation::Vertical);
        assert!(ship.covers(2, 3));
        assert!(ship.covers(2, 5));
        assert!(!ship.covers(2, 6));
        assert!(!ship.covers(3, 3));
    }

    #[test]
    fn test_all_sunk() {
        let mut ships = vec![
            Ship::new(0, 0, 2, Orientation::Horizontal),
            Ship::new(5, 5, 1, Orientation::Horizontal),
        ];
        assert!(!all_sunk(&ships));
        ships[0].hits = 2;
        assert!(!all_sunk(&ships));
        ships[1].hits = 1;
        assert!(all_sunk(&ships));
        assert!(all_sunk(&[]));
    }

    #[test]
    fn test_place_builds_grid_and_zeroes_hits() {
        let mut fleet = legal_fleet();
        fleet[0].hits = 4;
        let mut board = PlayerBoard::default();
        board.place(fleet).unwrap();

        assert!(board.ready);
        assert_eq!(board.ships[0].hits, 0);
        assert_eq!(board.grid.iter().filter(|c| *c == GridCell::Ship).count(), 20);
        assert_eq!(board.grid.get(3, 0), GridCell::Ship);
        assert_eq!(board.grid.get(4, 0), GridCell::Empty);
    }

    #[test]
    fn test_rejected_place_leaves_board_untouched() {
        let mut board = PlayerBoard::default();
        board.place(legal_fleet()).unwrap();
        let before = board.clone();

        let mut bad = legal_fleet();
        bad.pop();
        assert!(board.place(bad).is_err());
        assert_eq!(board, before);
    }

    #[test]
    fn test_strike_sequence() {
        let mut board = PlayerBoard::default();
        board.place(legal_fleet()).unwrap();

        assert_eq!(board.strike(9, 9), Some(AttackOutcome::Miss));
        assert_eq!(board.strike(9, 9), None);
        assert_eq!(board.strike(3, 4), Some(AttackOutcome::Sunk { length: 1 }));
        assert_eq!(board.strike(0, 4), Some(AttackOutcome::Hit));
        assert_eq!(board.strike(1, 4), Some(AttackOutcome::Sunk { length: 2 }));
        assert_eq!(board.grid.get(1, 4), GridCell::Hit);
        assert!(!board.all_sunk());
    }

    #[test]
    fn test_grid_serialization() {
        let mut board = PlayerBoard::default();
        board.place(legal_fleet()).unwrap();
        board.strike(9, 9);
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json["grid"][0][0], "ship");
        assert_eq!(json["grid"][9][9], "miss");
        assert_eq!(json["grid"][9][8], "");
        assert_eq!(json["ships"][0]["direction"], "horizontal");
    }

    #[test]
    fn test_ship_accepts_orientation_alias() {
        let ship: Ship =
            serde_json::from_str(r#"{"x":1,"y":2,"length":3,"orientation":"vertical"}"#).unwrap();
        assert_eq!(ship, Ship::new(1, 2, 3, Orientation::Vertical));
    }

    proptest! {
        #[test]
        fn prop_shifted_legal_fleet_is_legal(dy in 0i32..=5) {
            let fleet: Vec<Ship> = legal_fleet()
                .into_iter()
                .map(|s| Ship::new(s.x, s.y + dy, s.length, s.orientation))
                .collect();
            prop_assert_eq!(validate_placement(&fleet), Ok(()));
        }

        #[test]
        fn prop_dropping_any_ship_is_rejected(index in 0usize..10) {
            let mut fleet = legal_fleet();
            fleet.remove(index);
            let rejected = matches!(
                validate_placement(&fleet),
                Err(PlacementError::FleetComposition { .. })
            );
            prop_assert!(rejected);
        }

        #[test]
        fn prop_extra_single_anywhere_is_rejected(x in 0i32..10, y in 0i32..10) {
            let mut fleet = legal_fleet();
            fleet.push(Ship::new(x, y, 1, Orientation::Horizontal));
            prop_assert!(validate_placement(&fleet).is_err());
        }
    }
}
