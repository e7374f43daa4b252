use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use common::robot::LidarConfig;
use serde::Deserialize;
use simulator::SimulatorConfig;
use slam::GridMapSlamConfig;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,

    pub lidar: LidarConfig,

    pub slam: GridMapSlamConfig,

    pub simulator: SimulatorConfig,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log the filter state every this many cycles, 0 disables progress logging.
    pub report_every: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self { report_every: 10 }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;

        Self::from_contents(&contents)
    }

    pub fn from_contents(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| anyhow!(e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_contents("{}").unwrap();
        assert_eq!(config.settings.report_every, 10);
        assert_eq!(config.slam.particles, 20);
        assert_eq!(config.lidar.beams, 286);
        assert!(config.simulator.scene.is_empty());
    }

    #[test]
    fn partial_config() {
        let config = Config::from_contents(
            r#"
slam:
  particles: 5
  seed: 3
  grid: { resolution: 0.5 }
lidar:
  range_max: 10.0
"#,
        )
        .unwrap();

        assert_eq!(config.slam.particles, 5);
        assert_eq!(config.slam.seed, Some(3));
        assert_eq!(config.slam.grid.resolution, 0.5);
        assert_eq!(config.slam.noise.sigma_x, 0.5);
        assert_eq!(config.lidar.range_max, 10.0);
        assert_eq!(config.lidar.range_min, 0.1);
    }

    #[test]
    fn unknown_scene_object_is_rejected() {
        assert!(Config::from_contents("simulator: { scene: [ !Circle { r: 1.0 } ] }").is_err());
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file("/does/not/exist.yaml").err().unwrap();
        assert!(err.to_string().contains("could not read config file"));
    }
}
