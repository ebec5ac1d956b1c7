//! Stream type tags used to validate wiring before the graph runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic type of a stream.
///
/// Two streams may share a Rust value type (acceleration and angular velocity are both
/// vectors) but still be incompatible; wiring is checked against this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// Body-frame specific force (m/s²)
    Acceleration,
    /// Body-frame angular velocity (rad/s)
    AngularVelocity,
    /// Magnetic field (not normalized)
    MagneticField,
    /// World (ENU) linear acceleration, gravity removed (m/s²)
    LinearAcceleration,
    /// ECEF position (m)
    EcefPosition,
    /// ECEF velocity (m/s)
    EcefVelocity,
    /// Static pressure (kPa)
    Pressure,
    /// Temperature (°C)
    Temperature,
    /// Bus voltage (V)
    Voltage,
    /// Bus current (A)
    Current,
    /// Range vector measured by a distance sensor (m)
    Distance,
    /// Aggregated proximity readings
    Proximity,
    /// Attitude (body → world rotation)
    Frame,
    /// Pilot/autopilot commands
    MultirotorCommands,
    /// Normalized servo/motor PWM duty
    Pwm,
}

/// Rust value representation backing a [`StreamType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// `nalgebra::Vector3<f64>`
    Vector,
    /// `f64`
    Scalar,
    /// [`crate::Frame`]
    Frame,
    /// [`crate::ProximityReading`]
    Proximity,
    /// [`crate::MultirotorCommands`]
    Commands,
}

impl StreamType {
    /// Value representation carried by streams of this type
    pub fn value_kind(self) -> ValueKind {
        match self {
            Self::Acceleration
            | Self::AngularVelocity
            | Self::MagneticField
            | Self::LinearAcceleration
            | Self::EcefPosition
            | Self::EcefVelocity
            | Self::Distance => ValueKind::Vector,
            Self::Pressure | Self::Temperature | Self::Voltage | Self::Current | Self::Pwm => {
                ValueKind::Scalar
            }
            Self::Frame => ValueKind::Frame,
            Self::Proximity => ValueKind::Proximity,
            Self::MultirotorCommands => ValueKind::Commands,
        }
    }

    /// Canonical snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acceleration => "acceleration",
            Self::AngularVelocity => "angular_velocity",
            Self::MagneticField => "magnetic_field",
            Self::LinearAcceleration => "linear_acceleration",
            Self::EcefPosition => "ecef_position",
            Self::EcefVelocity => "ecef_velocity",
            Self::Pressure => "pressure",
            Self::Temperature => "temperature",
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Distance => "distance",
            Self::Proximity => "proximity",
            Self::Frame => "frame",
            Self::MultirotorCommands => "multirotor_commands",
            Self::Pwm => "pwm",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_as_str() {
        for ty in [
            StreamType::Acceleration,
            StreamType::EcefPosition,
            StreamType::MultirotorCommands,
            StreamType::Pwm,
        ] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(StreamType::Acceleration.value_kind(), ValueKind::Vector);
        assert_eq!(StreamType::Pressure.value_kind(), ValueKind::Scalar);
        assert_eq!(StreamType::Frame.value_kind(), ValueKind::Frame);
    }
}
