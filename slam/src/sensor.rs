//! Pull based access to recorded sensor data.
//!
//! Every sensor kind implements [`SensorStream`] on its own and owns its read cursor. A
//! [`Timeline`] pairs a motion stream with a lidar stream and hands out one accumulated motion
//! delta and one scan per filter cycle until either stream runs dry.

use std::collections::VecDeque;

use anyhow::ensure;
use common::robot::{LidarConfig, MotionDelta, Scan};
use tracing::debug;

/// Sensor timestamps, in the unit of the recording (e.g. nanoseconds).
pub type Timestamp = u64;

pub trait SensorStream {
    type Sample;

    /// Prepares the stream for reading, validating the underlying data.
    fn load(&mut self) -> anyhow::Result<()>;

    /// Returns the next sample, or `None` once the stream is exhausted.
    fn read_next(&mut self) -> Option<Self::Sample>;

    /// Timestamp of the sample the next call to `read_next` returns.
    fn peek_next_timestamp(&self) -> Option<Timestamp>;
}

/// An in-memory recording of timestamped samples.
#[derive(Debug, Clone)]
pub struct Recording<T> {
    name: String,
    samples: VecDeque<(Timestamp, T)>,
    read: usize,
}

impl<T> Recording<T> {
    pub fn new(name: impl Into<String>, samples: Vec<(Timestamp, T)>) -> Self {
        Self {
            name: name.into(),
            samples: samples.into(),
            read: 0,
        }
    }

    /// Number of samples that have not been read yet.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    /// Number of samples read so far.
    pub fn read_count(&self) -> usize {
        self.read
    }
}

impl<T> SensorStream for Recording<T> {
    type Sample = T;

    fn load(&mut self) -> anyhow::Result<()> {
        let unordered = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .position(|((a, _), (b, _))| b < a);
        ensure!(
            unordered.is_none(),
            "recording '{}' is not ordered by time at sample {}",
            self.name,
            unordered.map_or(0, |i| i + 1)
        );

        debug!("Loaded recording '{}' with {} samples", self.name, self.samples.len());
        Ok(())
    }

    fn read_next(&mut self) -> Option<T> {
        let (_, sample) = self.samples.pop_front()?;
        self.read += 1;
        Some(sample)
    }

    fn peek_next_timestamp(&self) -> Option<Timestamp> {
        self.samples.front().map(|(t, _)| *t)
    }
}

/// A lidar that reports raw ranges, one per beam. Samples are converted into range gated scans
/// in the body frame of the robot.
pub struct LidarStream<S> {
    ranges: S,
    config: LidarConfig,
}

impl<S: SensorStream<Sample = Vec<f32>>> LidarStream<S> {
    pub fn new(ranges: S, config: LidarConfig) -> Self {
        Self { ranges, config }
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }
}

impl<S: SensorStream<Sample = Vec<f32>>> SensorStream for LidarStream<S> {
    type Sample = Scan;

    fn load(&mut self) -> anyhow::Result<()> {
        ensure!(
            self.config.range_max > self.config.range_min,
            "lidar range gate ({}, {}) is empty",
            self.config.range_min,
            self.config.range_max
        );
        self.ranges.load()
    }

    fn read_next(&mut self) -> Option<Scan> {
        self.ranges
            .read_next()
            .map(|ranges| self.config.scan(&ranges))
    }

    fn peek_next_timestamp(&self) -> Option<Timestamp> {
        self.ranges.peek_next_timestamp()
    }
}

/// Synchronizes a motion stream with a lidar stream.
pub struct Timeline<M, L> {
    motion: M,
    lidar: L,
}

impl<M, L> Timeline<M, L>
where
    M: SensorStream<Sample = MotionDelta>,
    L: SensorStream<Sample = Scan>,
{
    /// Loads both streams.
    pub fn new(mut motion: M, mut lidar: L) -> anyhow::Result<Self> {
        motion.load()?;
        lidar.load()?;
        Ok(Self { motion, lidar })
    }

    /// Sums up all motion recorded before the next scan. Returns `None` when there is no further
    /// scan or no further motion.
    pub fn get_next_delta(&mut self) -> Option<MotionDelta> {
        let next_scan = self.lidar.peek_next_timestamp()?;
        self.motion.peek_next_timestamp()?;

        let mut delta = MotionDelta::default();
        while let Some(t) = self.motion.peek_next_timestamp() {
            if t >= next_scan {
                break;
            }
            match self.motion.read_next() {
                Some(d) => delta += d,
                None => break,
            }
        }
        Some(delta)
    }

    /// Returns the next scan, or `None` when the lidar is exhausted.
    pub fn get_next_scan(&mut self) -> Option<Scan> {
        self.lidar.read_next()
    }

    pub fn motion(&self) -> &M {
        &self.motion
    }

    pub fn lidar(&self) -> &L {
        &self.lidar
    }
}
