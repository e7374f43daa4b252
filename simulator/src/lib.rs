use common::robot::{LidarConfig, Pose};
use nalgebra::{Point2, Vector2};
use serde::Deserialize;

use scene::ray::{LineSegment, Scene};
pub use sim::{Command, SimParameters, SimRecording, SimTime, Simulator};

pub mod scene;
mod sim;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub scene: Vec<SceneObject>,

    #[serde(default)]
    pub start: Pose,

    #[serde(default)]
    pub parameters: SimParameters,

    /// Driven in order after the first sweep.
    #[serde(default)]
    pub commands: Vec<Command>,
}

#[derive(Clone, Debug, Deserialize)]
pub enum SceneObject {
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Rectangle {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl SimulatorConfig {
    pub fn build_scene(&self) -> Scene {
        let mut scene = Scene::new();

        for o in &self.scene {
            match *o {
                SceneObject::Line { x1, y1, x2, y2 } => {
                    scene.add(LineSegment::new(x1, y1, x2, y2));
                }
                SceneObject::Rectangle {
                    x,
                    y,
                    width,
                    height,
                } => {
                    scene.add_rect(Point2::new(x, y), Vector2::new(width, height));
                }
            }
        }

        scene
    }

    /// Runs all commands and returns what the robot recorded on the way.
    pub fn simulate(&self, lidar: &LidarConfig) -> anyhow::Result<SimRecording> {
        let mut simulator =
            Simulator::new(self.build_scene(), lidar.clone(), self.parameters, self.start)?;
        simulator.run(&self.commands);
        Ok(simulator.into_recording())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CONFIG: &str = r#"
scene:
  - !Rectangle { x: -4.0, y: -3.0, width: 8.0, height: 6.0 }
  - !Line { x1: 1.0, y1: -3.0, x2: 1.0, y2: 0.0 }
start: { x: -2.0, y: 0.0, theta: 0.0 }
parameters:
  dt: 0.1
  steps_per_scan: 2
commands:
  - { speed: 1.0, turn_rate: 0.0, duration: 1.0 }
"#;

    #[test]
    fn scene_from_config() {
        let config: SimulatorConfig = serde_yaml::from_str(CONFIG).unwrap();
        assert_eq!(config.build_scene().walls().len(), 5);
        assert_eq!(config.commands.len(), 1);
        assert_eq!(config.parameters.steps_per_scan, 2);
    }

    #[test]
    fn simulate_config() {
        let config: SimulatorConfig = serde_yaml::from_str(CONFIG).unwrap();
        let recording = config.simulate(&LidarConfig::default()).unwrap();

        assert_eq!(recording.odometry.len(), 10);
        assert_eq!(recording.ranges.len(), 6);
        assert!(recording
            .ranges
            .iter()
            .all(|(_, r)| r.len() == LidarConfig::default().beams));
    }
}
