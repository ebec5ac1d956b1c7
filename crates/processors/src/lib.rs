//! # Processors
//!
//! Fusion and control nodes built on the sync engine, plus the factory that instantiates
//! every node type of a [`contracts::GraphBlueprint`].
//!
//! | Type | Inputs | Outputs |
//! |---|---|---|
//! | `position_estimator` | ecef position (reference), ecef velocity, linear acceleration, pressure | position, velocity |
//! | `gravity_filter` | frame (reference), acceleration | linear_acceleration |
//! | `stability_processor` | frame (reference), target frame | angular_velocity |
//! | `servo_gimbal` | frame, multirotor commands | x_pwm, y_pwm, z_pwm |
//! | `proximity` | N distances | proximity |

pub mod coordinates;
mod descriptor;
mod factory;
mod gimbal;
mod gravity;
mod position;
mod proximity;
mod stability;

pub use descriptor::RateDescriptor;
pub use factory::NodeFactory;
pub use gimbal::{ServoAxis, ServoGimbal, ServoGimbalConfig};
pub use gravity::{GravityFilter, GravityFilterConfig, STANDARD_GRAVITY};
pub use position::{PositionEstimator, PositionEstimatorConfig};
pub use proximity::{Proximity, ProximityConfig, ProximityDescriptor};
pub use stability::{StabilityProcessor, StabilityProcessorConfig};
