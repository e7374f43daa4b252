//! Particle filter SLAM on an occupancy grid.

pub mod map;
pub mod motion;
pub mod particle;
pub mod ray;
pub mod slam;

pub use map::{GridConfig, OccupancyGrid};
pub use slam::{GridMapSlam, GridMapSlamConfig, RunSummary, SlamState};
