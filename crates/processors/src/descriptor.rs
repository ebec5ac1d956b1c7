//! Shared descriptor shapes

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Descriptor of processors that only declare their output rate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RateDescriptor {
    /// Output rate (Hz); inputs are requested at the same rate
    #[validate(range(min = 1, message = "rate must be > 0"))]
    pub rate: u32,
}
