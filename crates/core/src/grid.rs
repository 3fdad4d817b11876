//! Grid geometry: cells, compass directions, and adjacency checks.
//!
//! The grid uses screen coordinates: `x` grows to the east and `y` grows to
//! the south, so `N` is `(0, -1)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// One of the four orthogonal expansion directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "W")]
    West,
}

/// All directions in the order neighbours are reported.
pub const ALL_DIRECTIONS: [Direction; 4] = [
    Direction::North,
    Direction::South,
    Direction::East,
    Direction::West,
];

impl Direction {
    /// Database / wire representation (`"N"`, `"E"`, `"S"`, `"W"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "N",
            Self::East => "E",
            Self::South => "S",
            Self::West => "W",
        }
    }

    /// Parse the single-letter representation.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "N" => Ok(Self::North),
            "E" => Ok(Self::East),
            "S" => Ok(Self::South),
            "W" => Ok(Self::West),
            other => Err(CoreError::Validation(format!(
                "Invalid direction '{other}'. Must be one of: N, E, S, W"
            ))),
        }
    }

    /// Unit step `(dx, dy)` for this direction.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::South => (0, 1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One `(x, y)` coordinate within a room's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    /// Where a room's first tile is placed.
    pub const ORIGIN: Cell = Cell { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell one unit away in `direction`, or `None` on coordinate overflow.
    pub fn step(self, direction: Direction) -> Option<Cell> {
        let (dx, dy) = direction.delta();
        Some(Cell {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }

    /// The four orthogonal neighbours, each tagged with the direction that
    /// leads from `self` to it.
    pub fn neighbors(self) -> Vec<(Direction, Cell)> {
        ALL_DIRECTIONS
            .iter()
            .filter_map(|&dir| self.step(dir).map(|cell| (dir, cell)))
            .collect()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Check that `target` is exactly one step from `source` in `direction`.
pub fn validate_adjacency(source: Cell, target: Cell, direction: Direction) -> Result<(), CoreError> {
    match source.step(direction) {
        Some(expected) if expected == target => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "Target position {target} does not match direction {direction} from {source}"
        ))),
    }
}
