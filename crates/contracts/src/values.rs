//! Composite stream values.

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Attitude of the vehicle: rotation from body frame to world (ENU) frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Body → world rotation
    pub rotation: UnitQuaternion<f64>,
}

impl Frame {
    /// Frame from roll/pitch/yaw (radians)
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            rotation: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
        }
    }
}

/// Latest healthy range vector of each sensor, as of one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProximityReading {
    /// Body-frame range vectors (m)
    pub distances: Vec<Vector3<f64>>,
}

impl ProximityReading {
    /// Closest obstacle distance, if any
    pub fn closest(&self) -> Option<f64> {
        self.distances
            .iter()
            .map(|d| d.norm())
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Commands produced by the pilot / autopilot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MultirotorCommands {
    /// Collective throttle, 0-1
    pub throttle: f64,

    /// Desired roll/pitch/yaw rates (rad/s)
    pub rates: Vector3<f64>,

    /// Desired gimbal attitude as roll/pitch/yaw (rad), world frame
    pub gimbal: Vector3<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_default_is_identity() {
        let frame = Frame::default();
        assert_eq!(frame.rotation, UnitQuaternion::identity());
    }

    #[test]
    fn test_proximity_closest() {
        let reading = ProximityReading {
            distances: vec![Vector3::new(3.0, 0.0, 0.0), Vector3::new(0.0, 1.5, 0.0)],
        };
        assert_eq!(reading.closest(), Some(1.5));
        assert_eq!(ProximityReading::default().closest(), None);
    }
}
