//! Core types for the intersection simulation
//!
//! Identifiers, enums and the fixed four-approach geometry. Coordinates
//! follow screen convention: x grows to the east, y grows to the south,
//! and a heading of 0 degrees points north.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VEHICLE_ID: AtomicU64 = AtomicU64::new(0);

/// A wrapper type for vehicle IDs
///
/// IDs are drawn from a process-wide counter so they never repeat, even
/// across independent simulation instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub u64);

impl VehicleId {
    pub fn next() -> Self {
        Self(NEXT_VEHICLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the four intersection entry roads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApproachId {
    North,
    South,
    East,
    West,
}

impl ApproachId {
    pub const ALL: [ApproachId; 4] = [
        ApproachId::North,
        ApproachId::South,
        ApproachId::East,
        ApproachId::West,
    ];

    pub fn index(self) -> usize {
        match self {
            ApproachId::North => 0,
            ApproachId::South => 1,
            ApproachId::East => 2,
            ApproachId::West => 3,
        }
    }

    /// The approach whose straight-through movement does not conflict with this one
    pub fn opposing(self) -> ApproachId {
        match self {
            ApproachId::North => ApproachId::South,
            ApproachId::South => ApproachId::North,
            ApproachId::East => ApproachId::West,
            ApproachId::West => ApproachId::East,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ApproachId::North => "North",
            ApproachId::South => "South",
            ApproachId::East => "East",
            ApproachId::West => "West",
        }
    }

    /// Fixed geometry of this approach
    pub fn geometry(self) -> ApproachGeometry {
        match self {
            ApproachId::North => ApproachGeometry {
                entry: Position::new(215.0, -20.0),
                heading: 180.0,
                stop_line: 160.0,
                exit_direction: ApproachId::South,
                axis: Axis::Y,
                axis_sign: 1.0,
                left_turn_at: 185.0,
                right_turn_at: 215.0,
            },
            ApproachId::South => ApproachGeometry {
                entry: Position::new(175.0, 420.0),
                heading: 0.0,
                stop_line: 240.0,
                exit_direction: ApproachId::North,
                axis: Axis::Y,
                axis_sign: -1.0,
                left_turn_at: 215.0,
                right_turn_at: 185.0,
            },
            ApproachId::East => ApproachGeometry {
                entry: Position::new(420.0, 215.0),
                heading: 270.0,
                stop_line: 240.0,
                exit_direction: ApproachId::West,
                axis: Axis::X,
                axis_sign: -1.0,
                left_turn_at: 185.0,
                right_turn_at: 215.0,
            },
            ApproachId::West => ApproachGeometry {
                entry: Position::new(-20.0, 175.0),
                heading: 90.0,
                stop_line: 160.0,
                exit_direction: ApproachId::East,
                axis: Axis::X,
                axis_sign: 1.0,
                left_turn_at: 215.0,
                right_turn_at: 185.0,
            },
        }
    }
}

impl fmt::Display for ApproachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The color of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalPhase {
    Red,
    Yellow,
    Green,
}

impl fmt::Display for SignalPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalPhase::Red => "RED",
            SignalPhase::Yellow => "YELLOW",
            SignalPhase::Green => "GREEN",
        })
    }
}

/// Class of vehicle in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleClass {
    /// Regular traffic, obeys signals and following distance
    Normal,
    /// Priority vehicle spawned during an emergency episode
    Emergency,
}

/// Movement a vehicle intends to make at the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnIntent {
    Straight,
    Left,
    Right,
}

/// Coordinate axis a vehicle travels along before it turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// A 2D position in the simulated field
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Position reached by travelling `distance` units along `heading_deg`
    pub fn advanced(&self, heading_deg: f64, distance: f64) -> Position {
        let radians = heading_deg.to_radians();
        Position {
            x: self.x + radians.sin() * distance,
            y: self.y - radians.cos() * distance,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Whether the position lies inside the simulated field (bounds inclusive)
    pub fn in_field(&self) -> bool {
        (FIELD_MIN..=FIELD_MAX).contains(&self.x) && (FIELD_MIN..=FIELD_MAX).contains(&self.y)
    }
}

/// Fixed geometry of an approach
///
/// Stop-line and turn checks work on the signed progress along the axis of
/// travel, so "further along" is always a larger number regardless of
/// which way the approach drives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachGeometry {
    pub entry: Position,
    /// Heading of freshly spawned vehicles, in degrees
    pub heading: f64,
    /// Raw coordinate of the stop line along `axis`
    pub stop_line: f64,
    /// Side of the field a straight-through vehicle leaves through
    pub exit_direction: ApproachId,
    pub axis: Axis,
    /// +1.0 when travel increases the axis coordinate, -1.0 otherwise
    pub axis_sign: f64,
    /// Raw coordinate at which a left turn snaps the heading
    pub left_turn_at: f64,
    /// Raw coordinate at which a right turn snaps the heading
    pub right_turn_at: f64,
}

impl ApproachGeometry {
    /// Signed progress of a position along the direction of travel
    pub fn progress(&self, position: &Position) -> f64 {
        let raw = match self.axis {
            Axis::X => position.x,
            Axis::Y => position.y,
        };
        raw * self.axis_sign
    }

    fn threshold(&self, raw: f64) -> f64 {
        raw * self.axis_sign
    }

    pub fn is_past_stop_line(&self, position: &Position) -> bool {
        self.progress(position) >= self.threshold(self.stop_line)
    }

    /// Whether moving from `current` to `candidate` crosses the stop line
    pub fn crosses_stop_line(&self, current: &Position, candidate: &Position) -> bool {
        let line = self.threshold(self.stop_line);
        self.progress(current) < line && self.progress(candidate) >= line
    }

    /// Whether a vehicle at `position` has reached the point where `turn` is executed
    pub fn reached_turn_point(&self, position: &Position, turn: TurnIntent) -> bool {
        let raw = match turn {
            TurnIntent::Straight => return false,
            TurnIntent::Left => self.left_turn_at,
            TurnIntent::Right => self.right_turn_at,
        };
        self.progress(position) >= self.threshold(raw)
    }
}

/// Width of a vehicle in world units
pub const VEHICLE_WIDTH: f64 = 10.0;

/// Length of a vehicle in world units
pub const VEHICLE_HEIGHT: f64 = 16.0;

/// Safe following distance multiplier for VEHICLE_HEIGHT
pub const SAFE_FOLLOWING_MULTIPLIER: f64 = 1.5;

/// Lower bound of the simulated field on both axes
pub const FIELD_MIN: f64 = -30.0;

/// Upper bound of the simulated field on both axes
pub const FIELD_MAX: f64 = 430.0;

/// Minimum speed of a normal vehicle, in units per millisecond
pub const NORMAL_BASE_SPEED: f64 = 0.05;

/// Random speed added on top of NORMAL_BASE_SPEED
pub const NORMAL_SPEED_JITTER: f64 = 0.02;

/// Speed of an emergency vehicle, in units per millisecond
pub const EMERGENCY_SPEED: f64 = 0.1;
