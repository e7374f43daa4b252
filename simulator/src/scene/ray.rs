use std::cmp::Ordering;

use nalgebra::{Point2, Vector2};

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    origin: Point2<f32>,
    direction: Vector2<f32>,
}

impl Ray {
    pub fn from_origin_direction(origin: Point2<f32>, direction: Vector2<f32>) -> Self {
        Self { origin, direction }
    }

    /// A ray with a unit length direction, intersections are then measured in world units.
    pub fn from_origin_angle(origin: Point2<f32>, angle: f32) -> Self {
        Self {
            origin,
            direction: Vector2::new(angle.cos(), angle.sin()),
        }
    }

    pub fn at(&self, u: f32) -> Point2<f32> {
        self.origin + u * self.direction
    }
}

pub trait Intersect {
    /// Returns the intersection between the object and the `Ray` as a
    /// length `u` along the `direction` of the ray such that the
    /// intersection point can be described by `ray.origin + u*ray.direction`,
    /// or `None` if no intersection occurs.
    fn intersect(&self, ray: &Ray) -> Option<f32>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    p1: Point2<f32>,
    p2: Point2<f32>,
}

impl LineSegment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            p1: Point2::new(x1, y1),
            p2: Point2::new(x2, y2),
        }
    }
}

impl Intersect for LineSegment {
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        let x1 = self.p1.x;
        let y1 = self.p1.y;
        let x2 = self.p2.x;
        let y2 = self.p2.y;

        let x3 = ray.origin.x;
        let y3 = ray.origin.y;
        let x4 = ray.origin.x + ray.direction.x;
        let y4 = ray.origin.y + ray.direction.y;

        let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);

        // parallel lines never intersect
        if denom == 0.0 {
            return None;
        }

        let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
        let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / denom;

        if (0.0..=1.0).contains(&t) && u > 0.0 {
            return Some(u);
        }
        None
    }
}

/// A collection of wall segments the simulated lidar can see.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    walls: Vec<LineSegment>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, wall: LineSegment) -> &mut Self {
        self.walls.push(wall);
        self
    }

    /// Adds the four sides of an axis aligned rectangle with corner `origin`.
    pub fn add_rect(&mut self, origin: Point2<f32>, size: Vector2<f32>) -> &mut Self {
        let (x0, y0) = (origin.x, origin.y);
        let (x1, y1) = (origin.x + size.x, origin.y + size.y);

        self.add(LineSegment::new(x0, y0, x1, y0))
            .add(LineSegment::new(x1, y0, x1, y1))
            .add(LineSegment::new(x1, y1, x0, y1))
            .add(LineSegment::new(x0, y1, x0, y0))
    }

    pub fn walls(&self) -> &[LineSegment] {
        &self.walls
    }
}

impl Intersect for Scene {
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        // keep lowest u value to only get closest intersection
        self.walls
            .iter()
            .filter_map(|o| o.intersect(ray))
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Less))
    }
}
