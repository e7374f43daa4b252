use anyhow::{anyhow, ensure};
use common::robot::{MotionDelta, Pose};
use rand::Rng;
use serde::Deserialize;
use statrs::distribution::Normal;

/// Standard deviations of the zero-mean gaussian noise added to every propagated particle.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub sigma_theta: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            sigma_x: 0.5,
            sigma_y: 0.5,
            sigma_theta: 0.01,
        }
    }
}

impl NoiseConfig {
    pub fn noiseless() -> Self {
        Self {
            sigma_x: 0.0,
            sigma_y: 0.0,
            sigma_theta: 0.0,
        }
    }
}

/// Odometry motion model: moves a pose `distance` along its current heading and then turns it
/// by `d_theta`.
#[derive(Debug, Clone)]
pub struct MotionModel {
    // a `None` axis is noiseless
    noise_x: Option<Normal>,
    noise_y: Option<Normal>,
    noise_theta: Option<Normal>,
}

fn axis_noise(name: &str, sigma: f64) -> anyhow::Result<Option<Normal>> {
    ensure!(
        sigma.is_finite() && sigma >= 0.0,
        "standard deviation of {name} must be non-negative, got {sigma}"
    );
    if sigma == 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, sigma)
        .map(Some)
        .map_err(|e| anyhow!("invalid noise for {name}: {e}"))
}

impl MotionModel {
    pub fn new(noise: &NoiseConfig) -> anyhow::Result<Self> {
        Ok(Self {
            noise_x: axis_noise("x", noise.sigma_x)?,
            noise_y: axis_noise("y", noise.sigma_y)?,
            noise_theta: axis_noise("theta", noise.sigma_theta)?,
        })
    }

    /// Deterministic update of `pose` by `delta`.
    pub fn apply(pose: &Pose, delta: &MotionDelta) -> Pose {
        pose.advance(delta)
    }

    /// Deterministic update followed by independent gaussian noise on each axis.
    pub fn sample<R: Rng>(&self, pose: &Pose, delta: &MotionDelta, rng: &mut R) -> Pose {
        let moved = Self::apply(pose, delta);

        let mut draw = |noise: &Option<Normal>| {
            noise
                .as_ref()
                .map_or(0.0, |n| rng.sample::<f64, _>(n) as f32)
        };

        Pose {
            x: moved.x + draw(&self.noise_x),
            y: moved.y + draw(&self.noise_y),
            theta: moved.theta + draw(&self.noise_theta),
        }
    }
}

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn moves_along_heading() {
        let pose = Pose::new(1.0, 1.0, FRAC_PI_2);
        let moved = MotionModel::apply(&pose, &MotionDelta::new(2.0, 0.5));

        assert_relative_eq!(moved.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(moved.y, 3.0, epsilon = 1e-6);
        assert_relative_eq!(moved.theta, FRAC_PI_2 + 0.5);
    }

    #[test]
    fn turns_after_moving() {
        // the translation uses the heading before the turn is applied
        let moved = MotionModel::apply(&Pose::default(), &MotionDelta::new(1.0, FRAC_PI_2));
        assert_relative_eq!(moved.x, 1.0);
        assert_relative_eq!(moved.y, 0.0);
        assert_relative_eq!(moved.theta, FRAC_PI_2);
    }

    #[test]
    fn noiseless_sample_is_deterministic() {
        let model = MotionModel::new(&NoiseConfig::noiseless()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let pose = Pose::new(0.0, 0.0, 0.3);
        let delta = MotionDelta::new(1.5, -0.1);

        assert_eq!(
            model.sample(&pose, &delta, &mut rng),
            MotionModel::apply(&pose, &delta)
        );
    }

    #[test]
    fn noise_statistics() {
        let model = MotionModel::new(&NoiseConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let n = 5000;
        let samples: Vec<Pose> = (0..n)
            .map(|_| model.sample(&Pose::default(), &MotionDelta::default(), &mut rng))
            .collect();

        let mean_x = samples.iter().map(|p| p.x as f64).sum::<f64>() / n as f64;
        let var_x = samples
            .iter()
            .map(|p| (p.x as f64 - mean_x).powi(2))
            .sum::<f64>()
            / n as f64;
        let mean_theta = samples.iter().map(|p| p.theta as f64).sum::<f64>() / n as f64;

        assert!(mean_x.abs() < 0.05, "mean x {mean_x}");
        assert_relative_eq!(var_x.sqrt(), 0.5, epsilon = 0.05);
        assert!(mean_theta.abs() < 0.001, "mean theta {mean_theta}");
    }

    #[test]
    fn same_seed_same_samples() {
        let model = MotionModel::new(&NoiseConfig::default()).unwrap();
        let delta = MotionDelta::new(1.0, 0.1);

        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| model.sample(&Pose::default(), &delta, &mut rng))
                .collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn negative_sigma_is_rejected() {
        let noise = NoiseConfig {
            sigma_theta: -1.0,
            ..Default::default()
        };
        assert!(MotionModel::new(&noise).is_err());
    }
}
