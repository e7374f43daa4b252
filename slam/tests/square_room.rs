use common::robot::{LidarConfig, MotionDelta, Pose, Scan};
use nalgebra::{Point2, Vector2};
use simulator::{scene::ray::Scene, Command, SimParameters, SimRecording, Simulator};
use slam::{
    grid::{map::GridConfig, motion::NoiseConfig},
    GridMapSlam, GridMapSlamConfig, LidarStream, Recording, SlamState, Timeline,
};

const CYCLES: usize = 50;

fn lidar() -> LidarConfig {
    LidarConfig {
        angle_min: 0.0,
        angle_max: 359.5,
        beams: 720,
        ..Default::default()
    }
}

fn slam_config(particles: usize, noise: NoiseConfig) -> GridMapSlamConfig {
    GridMapSlamConfig {
        particles,
        seed: Some(2024),
        noise,
        grid: GridConfig {
            x_min: -20.0,
            y_min: -20.0,
            x_max: 20.0,
            y_max: 20.0,
            resolution: 1.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// A robot standing still in the middle of a square room with walls at +-8.5.
fn record_room() -> SimRecording {
    let mut scene = Scene::new();
    scene.add_rect(Point2::new(-8.5, -8.5), Vector2::new(17.0, 17.0));

    let parameters = SimParameters {
        dt: 0.1,
        steps_per_scan: 1,
        ..Default::default()
    };
    let mut sim = Simulator::new(scene, lidar(), parameters, Pose::default()).unwrap();
    sim.run(&[Command {
        speed: 0.0,
        turn_rate: 0.0,
        duration: 0.1 * CYCLES as f32,
    }]);
    sim.into_recording()
}

fn timeline(
    recording: SimRecording,
) -> Timeline<Recording<MotionDelta>, LidarStream<Recording<Vec<f32>>>> {
    Timeline::new(
        Recording::new("odometry", recording.odometry),
        LidarStream::new(Recording::new("lidar", recording.ranges), lidar()),
    )
    .unwrap()
}

#[test]
fn map_converges_to_the_true_pose() {
    let recording = record_room();
    let scan: Scan = lidar().scan(&recording.ranges[0].1);
    assert_eq!(scan.len(), 720);

    let offsets = [
        Pose::new(1.0, 0.0, 0.0),
        Pose::new(-1.0, 0.0, 0.0),
        Pose::new(0.0, 1.0, 0.0),
        Pose::new(0.0, -1.0, 0.0),
    ];

    let mut slam = GridMapSlam::new(&slam_config(1, NoiseConfig::noiseless())).unwrap();
    let mut checked = 0;
    let summary = slam
        .run_with(&mut timeline(recording), |cycle, filter| {
            if cycle <= CYCLES - 10 {
                return;
            }
            let map = filter.map();
            let at_truth = map.correlate(&scan.to_world(&Pose::default()));
            for offset in &offsets {
                let shifted = map.correlate(&scan.to_world(offset));
                assert!(
                    at_truth > shifted,
                    "cycle {cycle}: {at_truth} at the true pose, {shifted} at {offset:?}"
                );
            }
            checked += 1;
        })
        .unwrap();

    assert_eq!(summary.cycles, CYCLES);
    assert_eq!(checked, 10);
    assert_eq!(summary.final_pose, Pose::default());
    assert_eq!(slam.state(), SlamState::Terminated);

    // one trajectory entry for the initial scan and one per cycle
    assert_eq!(slam.trajectory().len(), CYCLES + 1);

    // walls saturate, the inside is free
    let map = slam.map();
    let (_, upper) = map.limits();
    let wall = map.world_to_grid(&Point2::new(8.5, 0.0));
    assert_eq!(map.log_odds_at(wall), Some(upper));
    assert_eq!(map.is_occupied(map.world_to_grid(&Point2::new(0.0, 4.0))), Some(false));
}

#[test]
fn particles_stay_near_a_still_robot() {
    let noise = NoiseConfig {
        sigma_x: 0.1,
        sigma_y: 0.1,
        sigma_theta: 0.005,
    };
    let mut slam = GridMapSlam::new(&slam_config(15, noise)).unwrap();
    let summary = slam.run(&mut timeline(record_room())).unwrap();

    assert_eq!(summary.cycles, CYCLES);
    let pose = summary.final_pose;
    assert!(pose.x.abs() < 1.0 && pose.y.abs() < 1.0, "{pose:?}");
    assert!(pose.theta.abs() < 0.1, "{pose:?}");

    // the anchor is never perturbed
    assert_eq!(slam.particles().last().map(|p| p.value), Some(Pose::default()));
}
