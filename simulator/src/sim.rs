use anyhow::{anyhow, ensure};
use common::robot::{LidarConfig, MotionDelta, Pose};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Deserialize;
use statrs::distribution::Normal;
use tracing::debug;

use crate::scene::ray::{Intersect, Ray, Scene};

/// Microseconds since the start of the simulation.
pub type SimTime = u64;

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SimParameters {
    /// Length of one simulation step in seconds. One odometry sample is produced per step.
    pub dt: f32,

    /// Number of steps between two lidar sweeps.
    pub steps_per_scan: usize,

    /// Standard deviation of the noise added to every lidar range.
    pub range_noise: f32,

    /// Standard deviation of the noise added to the distance and rotation of every odometry
    /// sample.
    pub odometry_noise: f32,

    pub seed: u64,
}

impl Default for SimParameters {
    fn default() -> Self {
        Self {
            dt: 1.0 / 30.0,
            steps_per_scan: 6,
            range_noise: 0.0,
            odometry_noise: 0.0,
            seed: 0,
        }
    }
}

/// Drive with constant speed and turn rate for a while.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Command {
    pub speed: f32,
    pub turn_rate: f32,
    pub duration: f32,
}

/// Everything the simulated robot sensed, plus the true poses at every scan.
#[derive(Debug, Clone, Default)]
pub struct SimRecording {
    pub odometry: Vec<(SimTime, MotionDelta)>,
    pub ranges: Vec<(SimTime, Vec<f32>)>,
    pub ground_truth: Vec<(SimTime, Pose)>,
}

/// Drives a differential robot through a static scene and records odometry and lidar sweeps.
pub struct Simulator {
    scene: Scene,
    lidar: LidarConfig,
    parameters: SimParameters,
    pose: Pose,
    time: SimTime,
    steps: usize,
    rng: StdRng,
    range_noise: Option<Normal>,
    odometry_noise: Option<Normal>,
    recording: SimRecording,
}

fn noise(name: &str, sigma: f32) -> anyhow::Result<Option<Normal>> {
    ensure!(sigma >= 0.0, "{name} must be non-negative, got {sigma}");
    if sigma == 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, sigma as f64)
        .map(Some)
        .map_err(|e| anyhow!("invalid {name}: {e}"))
}

impl Simulator {
    /// Creates the simulator with the robot at `start` and records the first sweep.
    pub fn new(
        scene: Scene,
        lidar: LidarConfig,
        parameters: SimParameters,
        start: Pose,
    ) -> anyhow::Result<Self> {
        ensure!(parameters.dt > 0.0, "time step must be positive");
        ensure!(parameters.steps_per_scan > 0, "steps_per_scan must be positive");

        let mut sim = Self {
            scene,
            lidar,
            parameters,
            pose: start,
            time: 0,
            steps: 0,
            rng: StdRng::seed_from_u64(parameters.seed),
            range_noise: noise("range_noise", parameters.range_noise)?,
            odometry_noise: noise("odometry_noise", parameters.odometry_noise)?,
            recording: SimRecording::default(),
        };
        sim.record_scan();
        Ok(sim)
    }

    /// Raw lidar ranges from the current pose, one per beam. Beams that hit nothing report
    /// infinity.
    pub fn sweep(&mut self) -> Vec<f32> {
        let sensor = self.pose.transform_point(&self.lidar.mount.position());
        let heading = self.pose.theta + self.lidar.mount.theta;

        self.lidar
            .angles()
            .into_iter()
            .map(|angle| {
                let ray = Ray::from_origin_angle(sensor, heading + angle);
                match self.scene.intersect(&ray) {
                    Some(u) => u + self.draw(self.range_noise),
                    None => f32::INFINITY,
                }
            })
            .collect()
    }

    /// Advances the simulation by one time step.
    pub fn tick(&mut self, command: &Command) {
        let dt = self.parameters.dt;
        let truth = MotionDelta::new(command.speed * dt, command.turn_rate * dt);
        self.pose = self.pose.advance(&truth);
        self.time += (dt as f64 * 1e6).round() as SimTime;
        self.steps += 1;

        let measured = MotionDelta::new(
            truth.distance + self.draw(self.odometry_noise),
            truth.d_theta + self.draw(self.odometry_noise),
        );
        self.recording.odometry.push((self.time, measured));

        if self.steps % self.parameters.steps_per_scan == 0 {
            // the sweep is taken just after the odometry sample of the same step
            self.time += 1;
            self.record_scan();
        }
    }

    /// Executes all commands one after the other.
    pub fn run(&mut self, commands: &[Command]) {
        for command in commands {
            let steps = (command.duration / self.parameters.dt).round() as usize;
            for _ in 0..steps {
                self.tick(command);
            }
        }
        debug!(
            "Simulated {} steps, {} sweeps",
            self.steps,
            self.recording.ranges.len()
        );
    }

    pub fn into_recording(self) -> SimRecording {
        self.recording
    }

    fn record_scan(&mut self) {
        let ranges = self.sweep();
        self.recording.ranges.push((self.time, ranges));
        self.recording.ground_truth.push((self.time, self.pose));
    }

    fn draw(&mut self, noise: Option<Normal>) -> f32 {
        noise.map_or(0.0, |n| self.rng.sample::<f64, _>(n) as f32)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use nalgebra::{Point2, Vector2};

    use super::*;

    fn room() -> Scene {
        let mut scene = Scene::new();
        scene.add_rect(Point2::new(-5.0, -5.0), Vector2::new(10.0, 10.0));
        scene
    }

    fn lidar() -> LidarConfig {
        LidarConfig {
            angle_min: 0.0,
            angle_max: 270.0,
            beams: 4,
            ..Default::default()
        }
    }

    #[test]
    fn sweep_in_a_room() {
        let mut sim =
            Simulator::new(room(), lidar(), SimParameters::default(), Pose::new(1.0, 0.0, 0.0))
                .unwrap();

        let ranges = sim.sweep();
        let expected = [4.0, 5.0, 6.0, 5.0];
        for (r, e) in ranges.iter().zip(expected) {
            assert_relative_eq!(*r, e, epsilon = 1e-4);
        }
    }

    #[test]
    fn misses_are_infinite() {
        let mut sim =
            Simulator::new(Scene::new(), lidar(), SimParameters::default(), Pose::default())
                .unwrap();
        assert!(sim.sweep().iter().all(|r| r.is_infinite()));
    }

    #[test]
    fn odometry_between_sweeps() {
        let parameters = SimParameters {
            dt: 0.1,
            steps_per_scan: 5,
            ..Default::default()
        };
        let mut sim = Simulator::new(room(), lidar(), parameters, Pose::default()).unwrap();
        sim.run(&[Command {
            speed: 1.0,
            turn_rate: 0.0,
            duration: 2.0,
        }]);

        let rec = sim.into_recording();
        assert_eq!(rec.odometry.len(), 20);
        assert_eq!(rec.ranges.len(), 5);
        assert_eq!(rec.ground_truth.len(), 5);

        // every sweep comes after the odometry of its step
        let (t_scan, _) = rec.ranges[1];
        let (t_odom, _) = rec.odometry[4];
        assert!(t_scan > t_odom);
        assert!(rec.odometry[5].0 > t_scan);

        let travelled: f32 = rec.odometry.iter().map(|(_, d)| d.distance).sum();
        assert_relative_eq!(travelled, 2.0, epsilon = 1e-5);
        assert_relative_eq!(rec.ground_truth[4].1.x, 2.0, epsilon = 1e-5);

        // the straight ahead beam shrinks as the robot drives towards the wall
        assert_relative_eq!(rec.ranges[4].1[0], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn noise_is_reproducible() {
        let parameters = SimParameters {
            range_noise: 0.05,
            odometry_noise: 0.01,
            seed: 17,
            ..Default::default()
        };
        let command = Command {
            speed: 0.5,
            turn_rate: 0.1,
            duration: 1.0,
        };

        let run = || {
            let mut sim = Simulator::new(room(), lidar(), parameters, Pose::default()).unwrap();
            sim.run(&[command]);
            sim.into_recording()
        };

        let (a, b) = (run(), run());
        assert_eq!(a.odometry, b.odometry);
        assert_eq!(a.ranges, b.ranges);
    }

    #[test]
    fn invalid_parameters() {
        let parameters = SimParameters {
            range_noise: -1.0,
            ..Default::default()
        };
        assert!(Simulator::new(room(), lidar(), parameters, Pose::default()).is_err());
    }
}
