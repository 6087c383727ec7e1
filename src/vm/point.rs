use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Number of addressable components of a point: X, Y, Z, W, P, R.
pub const POINT_COMPONENTS: usize = 6;

pub const COMPONENT_NAMES: [&str; POINT_COMPONENTS] = ["X", "Y", "Z", "W", "P", "R"];

/// A cartesian position plus a W/P/R orientation, in millimeters and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub position: [f32; 3],
    pub orientation: [f32; 3],
}

impl Point {
    pub const fn new(position: [f32; 3], orientation: [f32; 3]) -> Self {
        Point {
            position,
            orientation,
        }
    }

    pub fn component(&self, index: usize) -> Option<f32> {
        match index {
            0..=2 => Some(self.position[index]),
            3..=5 => Some(self.orientation[index - 3]),
            _ => None,
        }
    }

    /// Returns false when `index` is not a valid component.
    pub fn set_component(&mut self, index: usize, value: f32) -> bool {
        match index {
            0..=2 => self.position[index] = value,
            3..=5 => self.orientation[index - 3] = value,
            _ => return false,
        }
        true
    }

    /// Position sum, keeping this point's orientation.
    pub fn offset_by(&self, other: &Point) -> Point {
        let mut res = *self;
        for (p, o) in res.position.iter_mut().zip(other.position) {
            *p += o;
        }
        res
    }

    /// Position difference, keeping this point's orientation.
    pub fn minus(&self, other: &Point) -> Point {
        let mut res = *self;
        for (p, o) in res.position.iter_mut().zip(other.position) {
            *p -= o;
        }
        res
    }

    /// Linear interpolation of every component, `t` in `[0, 1]`.
    pub fn lerp(&self, other: &Point, t: f32) -> Point {
        let mut res = *self;
        for i in 0..POINT_COMPONENTS {
            let (a, b) = (self.component(i).unwrap_or(0.0), other.component(i).unwrap_or(0.0));
            res.set_component(i, a + (b - a) * t);
        }
        res
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [x, y, z] = self.position;
        let [w, p, r] = self.orientation;
        write!(f, "({x:.2}, {y:.2}, {z:.2} | {w:.2}, {p:.2}, {r:.2})")
    }
}

/// Live state of the arm as seen by programs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotPose {
    /// Tool tip in world coordinates.
    pub tool_tip: Point,
    /// Joint angles J1..J6, in degrees.
    pub joints: [f32; POINT_COMPONENTS],
}

impl RobotPose {
    /// The pose as a point: the cartesian tool tip, or the joint angles packed
    /// as position (J1..J3) and orientation (J4..J6).
    pub fn as_point(&self, cartesian: bool) -> Point {
        if cartesian {
            self.tool_tip
        } else {
            let j = self.joints;
            Point::new([j[0], j[1], j[2]], [j[3], j[4], j[5]])
        }
    }
}
