pub mod grid;
pub mod sensor;

pub use grid::{GridMapSlam, GridMapSlamConfig, RunSummary, SlamState};
pub use sensor::{LidarStream, Recording, SensorStream, Timeline, Timestamp};
