use std::ops::{Add, AddAssign};

use nalgebra::{Point2, Rotation2, Vector2};
use serde::Deserialize;

/// The pose of a robot in the 2D plane.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize)]
pub struct Pose {
    /// The x position of the robot
    pub x: f32,

    /// The y position of the robot
    pub y: f32,

    /// The rotation of the robot, measured in radians counter-clockwise from the positive x-axis.
    pub theta: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, theta: f32) -> Self {
        Self { x, y, theta }
    }

    pub fn xy(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }

    pub fn position(&self) -> Point2<f32> {
        Point2::new(self.x, self.y)
    }

    /// Applies the rigid transform `R(theta) * p + (x, y)` to a point given in the frame of this pose.
    pub fn transform_point(&self, point: &Point2<f32>) -> Point2<f32> {
        Rotation2::new(self.theta) * point + self.xy()
    }

    /// Moves `delta.distance` along the current heading, then turns by `delta.d_theta`.
    pub fn advance(&self, delta: &MotionDelta) -> Pose {
        Pose {
            x: self.x + delta.distance * self.theta.cos(),
            y: self.y + delta.distance * self.theta.sin(),
            theta: self.theta + delta.d_theta,
        }
    }

    /// Transforms all points from the frame of this pose into the parent frame.
    pub fn transform_points(&self, points: &[Point2<f32>]) -> Vec<Point2<f32>> {
        let rotation = Rotation2::new(self.theta);
        let translation = self.xy();
        points.iter().map(|p| rotation * p + translation).collect()
    }
}

/// Motion of the robot accumulated since the previous filter cycle, as reported by the
/// odometry (wheel encoders + gyro).
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct MotionDelta {
    /// Distance travelled along the heading.
    pub distance: f32,

    /// Change in heading in radians.
    pub d_theta: f32,
}

impl MotionDelta {
    pub fn new(distance: f32, d_theta: f32) -> Self {
        Self { distance, d_theta }
    }
}

impl Add for MotionDelta {
    type Output = MotionDelta;

    fn add(self, rhs: MotionDelta) -> Self::Output {
        MotionDelta {
            distance: self.distance + rhs.distance,
            d_theta: self.d_theta + rhs.d_theta,
        }
    }
}

impl AddAssign for MotionDelta {
    fn add_assign(&mut self, rhs: MotionDelta) {
        self.distance += rhs.distance;
        self.d_theta += rhs.d_theta;
    }
}

/// A range scan as cartesian points in the body frame of the robot. Only contains valid
/// (range gated) measurements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scan {
    pub points: Vec<Point2<f32>>,
}

impl Scan {
    pub fn new(points: Vec<Point2<f32>>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns the scan points in the world frame given the pose of the robot.
    pub fn to_world(&self, pose: &Pose) -> Vec<Point2<f32>> {
        pose.transform_points(&self.points)
    }
}

/// Contains all raw data for a single lidar scan (a complete sweep)
#[derive(Debug, Clone)]
pub struct Observation {
    pub id: usize,
    pub measurements: Vec<Measurement>,
}

impl Observation {
    /// Converts the valid measurements into cartesian points in the body frame of the robot
    /// using the mounting pose of the sensor.
    pub fn to_scan(&self, mount: &Pose) -> Scan {
        let points = self
            .measurements
            .iter()
            .filter(|&m| m.valid)
            .map(|m| {
                mount.transform_point(&Point2::new(
                    m.angle.cos() * m.distance,
                    m.angle.sin() * m.distance,
                ))
            })
            .collect();
        Scan { points }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    /// The angle this measurement was acquired at (relative to the sensor zero) in radians.
    pub angle: f32,

    /// The measured distance.
    pub distance: f32,

    /// If this measurement passed the range gate of the sensor
    pub valid: bool,
}

/// Describes the beam layout, valid range and mounting of a planar lidar.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LidarConfig {
    /// Angle of the first beam in degrees.
    pub angle_min: f32,

    /// Angle of the last beam in degrees.
    pub angle_max: f32,

    /// Number of beams in one sweep, evenly spaced between `angle_min` and `angle_max`.
    pub beams: usize,

    /// Ranges at or below this value are discarded.
    pub range_min: f32,

    /// Ranges at or above this value are discarded.
    pub range_max: f32,

    /// Pose of the sensor in the body frame of the robot.
    pub mount: Pose,
}

impl Default for LidarConfig {
    fn default() -> Self {
        Self {
            angle_min: -5.0,
            angle_max: 185.0,
            beams: 286,
            range_min: 0.1,
            range_max: 60.0,
            mount: Pose::default(),
        }
    }
}

impl LidarConfig {
    /// Beam angles in radians, `beams` values from `angle_min` to `angle_max` inclusive.
    pub fn angles(&self) -> Vec<f32> {
        match self.beams {
            0 => Vec::new(),
            1 => vec![self.angle_min.to_radians()],
            n => {
                let step = (self.angle_max - self.angle_min) / (n - 1) as f32;
                (0..n)
                    .map(|i| (self.angle_min + step * i as f32).to_radians())
                    .collect()
            }
        }
    }

    pub fn in_range(&self, range: f32) -> bool {
        range > self.range_min && range < self.range_max
    }

    /// Builds an observation from raw ranges, one per beam, marking out of range values invalid.
    pub fn observation(&self, id: usize, ranges: &[f32]) -> Observation {
        let measurements = self
            .angles()
            .into_iter()
            .zip(ranges)
            .map(|(angle, &distance)| Measurement {
                angle,
                distance,
                valid: self.in_range(distance),
            })
            .collect();
        Observation { id, measurements }
    }

    /// Converts raw ranges straight into a gated body frame scan.
    pub fn scan(&self, ranges: &[f32]) -> Scan {
        self.observation(0, ranges).to_scan(&self.mount)
    }
}
