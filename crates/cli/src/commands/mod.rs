//! CLI command implementations

pub mod device;
pub mod model;
pub mod score;
