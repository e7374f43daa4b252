use std::time::Instant;

use anyhow::{bail, ensure};
use common::{
    robot::{MotionDelta, Pose, Scan},
    PerfStats,
};
use nalgebra::Point2;
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::sensor::{SensorStream, Timeline};

use super::{
    map::{GridConfig, GridData, OccupancyGrid},
    motion::{MotionModel, NoiseConfig},
    particle::{Particle, ParticleFilter},
    ray::IntPoint,
};

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GridMapSlamConfig {
    /// Number of particles, including the anchor. A single particle follows the odometry
    /// without noise. Unlike a pure dead reckoning mode it still scores and integrates every scan,
    /// so the map is built along the odometry path.
    pub particles: usize,

    /// Seed for the random number generator. Runs with the same seed and inputs are identical.
    pub seed: Option<u64>,

    /// Added to the weight sum before normalizing so that an all-zero weight vector stays finite.
    pub epsilon: f64,

    pub noise: NoiseConfig,

    pub grid: GridConfig,
}

impl Default for GridMapSlamConfig {
    fn default() -> Self {
        Self {
            particles: 20,
            seed: None,
            epsilon: 1e-5,
            noise: NoiseConfig::default(),
            grid: GridConfig::default(),
        }
    }
}

/// Where the filter is in its `predict -> update -> resample` cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlamState {
    /// No scan has been integrated yet.
    Uninitialised,
    /// The map is seeded; ready to predict.
    Ready,
    Predicted,
    Updated,
    /// The timeline is exhausted. The map and the particles can still be queried.
    Terminated,
}

/// Result of [`GridMapSlam::run`].
pub struct RunSummary {
    /// Number of complete predict/update/resample cycles.
    pub cycles: usize,
    pub final_pose: Pose,
    pub occupied_cells: usize,
    /// Time spent per cycle.
    pub cycle_stats: PerfStats,
}

/// Simultaneous localization and mapping with a particle filter over an occupancy grid. Only the
/// best particle of each cycle writes its scan into the single shared map.
pub struct GridMapSlam {
    config: GridMapSlamConfig,
    map: OccupancyGrid,
    filter: ParticleFilter<Pose>,
    motion: MotionModel,
    rng: StdRng,
    state: SlamState,
    best_pose: Pose,
    best_score: u32,
    last_ess: f64,
    trajectory: Vec<IntPoint>,
}

impl GridMapSlam {
    pub fn new(config: &GridMapSlamConfig) -> anyhow::Result<Self> {
        ensure!(config.particles > 0, "at least one particle is required");
        ensure!(
            config.epsilon > 0.0,
            "epsilon must be positive, got {}",
            config.epsilon
        );

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config: config.clone(),
            map: OccupancyGrid::new(&config.grid)?,
            filter: ParticleFilter::new(config.particles, Pose::default()),
            motion: MotionModel::new(&config.noise)?,
            rng,
            state: SlamState::Uninitialised,
            best_pose: Pose::default(),
            best_score: 0,
            last_ess: config.particles as f64,
            trajectory: Vec::new(),
        })
    }

    /// Seeds the map with the first scan, observed from the zero pose.
    pub fn initialise_map(&mut self, first_scan: &Scan) -> anyhow::Result<()> {
        if self.state != SlamState::Uninitialised {
            bail!("the map is already initialised (state {:?})", self.state);
        }

        self.best_pose = Pose::default();
        self.best_score = 0;
        self.integrate(first_scan);
        self.state = SlamState::Ready;

        info!(
            "Map initialised from {} scan points, {} occupied cells",
            first_scan.len(),
            self.map.occupied_count()
        );
        Ok(())
    }

    /// Moves every particle by the odometry `delta`. All particles but the anchor get noise.
    pub fn predict(&mut self, delta: &MotionDelta) -> anyhow::Result<()> {
        self.expect_state(SlamState::Ready, "predict")?;

        let motion = &self.motion;
        let rng = &mut self.rng;
        self.filter.propagate(|pose, anchor| {
            *pose = if anchor {
                MotionModel::apply(pose, delta)
            } else {
                motion.sample(pose, delta, rng)
            };
        });

        self.state = SlamState::Predicted;
        Ok(())
    }

    /// Weighs every particle by how well the scan matches the map from its pose and integrates
    /// the scan from the pose of the best particle. An empty scan leaves weights and map as they
    /// are.
    pub fn update(&mut self, scan: &Scan) -> anyhow::Result<()> {
        self.expect_state(SlamState::Predicted, "update")?;
        self.state = SlamState::Updated;

        if scan.is_empty() {
            warn!("Empty scan, skipping the measurement update");
            return Ok(());
        }

        let map = &self.map;
        let mut scores = Vec::with_capacity(self.filter.len());
        let best = self.filter.weigh(
            |pose| {
                let score = map.correlate(&scan.to_world(pose));
                scores.push(score);
                f64::from(score)
            },
            self.config.epsilon,
        );

        self.last_ess = self.filter.number_of_effective_particles();
        self.best_pose = *self.filter.particle_value(best);
        self.best_score = scores[best];
        self.integrate(scan);

        debug!(
            "Best particle {} at ({:.2}, {:.2}, {:.3}) with score {}",
            best, self.best_pose.x, self.best_pose.y, self.best_pose.theta, self.best_score
        );
        Ok(())
    }

    /// Redraws the particle set from the weights. Runs every cycle, the effective sample size is
    /// not consulted.
    pub fn resample(&mut self) -> anyhow::Result<()> {
        self.expect_state(SlamState::Updated, "resample")?;

        self.filter.resample(&mut self.rng);

        self.state = SlamState::Ready;
        Ok(())
    }

    /// Stops the filter. The map and particles stay available for queries.
    pub fn terminate(&mut self) {
        self.state = SlamState::Terminated;
    }

    /// Writes values observed in the body frame (e.g. colours from a camera) into an external
    /// layer, placing them with the current best pose. Returns the number of values written.
    pub fn texture_map<T: Clone>(
        &self,
        layer: &mut GridData<T>,
        body_points: &[Point2<f32>],
        values: &[T],
    ) -> anyhow::Result<usize> {
        let world = self.best_pose.transform_points(body_points);
        self.map.write_layer(layer, &world, values)
    }

    /// Runs predict/update/resample until the timeline is exhausted. If the map is not
    /// initialised yet, the first scan of the timeline is used for that.
    pub fn run<M, L>(&mut self, timeline: &mut Timeline<M, L>) -> anyhow::Result<RunSummary>
    where
        M: SensorStream<Sample = MotionDelta>,
        L: SensorStream<Sample = Scan>,
    {
        self.run_with(timeline, |_, _| {})
    }

    /// Like [`Self::run`], calling `after_cycle` with the cycle number after every completed
    /// cycle. The filter is in a consistent state whenever the callback runs.
    pub fn run_with<M, L>(
        &mut self,
        timeline: &mut Timeline<M, L>,
        mut after_cycle: impl FnMut(usize, &GridMapSlam),
    ) -> anyhow::Result<RunSummary>
    where
        M: SensorStream<Sample = MotionDelta>,
        L: SensorStream<Sample = Scan>,
    {
        let mut cycle_stats = PerfStats::new();
        let mut cycles = 0;

        if self.state == SlamState::Uninitialised {
            match timeline.get_next_scan() {
                Some(scan) => self.initialise_map(&scan)?,
                None => {
                    warn!("Timeline contains no scans, nothing to do");
                    self.terminate();
                    return Ok(self.summary(cycles, cycle_stats));
                }
            }
        }
        self.expect_state(SlamState::Ready, "run")?;

        loop {
            let Some(delta) = timeline.get_next_delta() else {
                break;
            };
            let Some(scan) = timeline.get_next_scan() else {
                break;
            };

            let start = Instant::now();
            self.predict(&delta)?;
            self.update(&scan)?;
            self.resample()?;
            cycle_stats.update(start.elapsed());

            cycles += 1;
            after_cycle(cycles, self);
        }

        self.terminate();
        info!(
            "Timeline exhausted after {} cycles, cycle time {}",
            cycles, cycle_stats
        );

        Ok(self.summary(cycles, cycle_stats))
    }

    fn summary(&self, cycles: usize, cycle_stats: PerfStats) -> RunSummary {
        RunSummary {
            cycles,
            final_pose: self.best_pose,
            occupied_cells: self.map.occupied_count(),
            cycle_stats,
        }
    }

    fn integrate(&mut self, scan: &Scan) {
        let world = scan.to_world(&self.best_pose);
        let integration = self.map.integrate_scan(&self.best_pose, &world);
        self.trajectory.push(integration.origin);
    }

    fn expect_state(&self, expected: SlamState, operation: &str) -> anyhow::Result<()> {
        ensure!(
            self.state == expected,
            "cannot {operation} in state {:?}, expected {:?}",
            self.state,
            expected
        );
        Ok(())
    }

    pub fn state(&self) -> SlamState {
        self.state
    }

    pub fn map(&self) -> &OccupancyGrid {
        &self.map
    }

    pub fn particles(&self) -> &[Particle<Pose>] {
        self.filter.particles()
    }

    /// Pose of the particle that was used for the latest map update.
    pub fn best_pose(&self) -> Pose {
        self.best_pose
    }

    /// Correlation of the latest scored scan with the map from the best pose, before the scan
    /// was integrated. 0 until the first update.
    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    /// Effective sample size of the weights of the latest update, before they were resampled.
    pub fn effective_sample_size(&self) -> f64 {
        self.last_ess
    }

    /// Grid cells of every pose a scan was integrated from, oldest first.
    pub fn trajectory(&self) -> &[IntPoint] {
        &self.trajectory
    }

    pub fn config(&self) -> &GridMapSlamConfig {
        &self.config
    }
}
