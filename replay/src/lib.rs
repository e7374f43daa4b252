use anyhow::Context;
use slam::{GridMapSlam, LidarStream, Recording, RunSummary, Timeline};
use tracing::info;

use config::Config;

pub mod config;

/// Simulates the configured drive and runs the filter over the resulting recording.
pub fn replay(config: &Config) -> anyhow::Result<RunSummary> {
    let recording = config
        .simulator
        .simulate(&config.lidar)
        .context("simulation failed")?;
    info!(
        "Simulated {} odometry samples and {} lidar sweeps",
        recording.odometry.len(),
        recording.ranges.len()
    );

    let truth = recording.ground_truth.last().map(|(_, pose)| *pose);

    let odometry = Recording::new("odometry", recording.odometry);
    let lidar = LidarStream::new(Recording::new("lidar", recording.ranges), config.lidar.clone());
    let mut timeline = Timeline::new(odometry, lidar)?;

    let mut slam = GridMapSlam::new(&config.slam)?;
    let report_every = config.settings.report_every;
    let summary = slam.run_with(&mut timeline, |cycle, filter| {
        if report_every > 0 && cycle % report_every == 0 {
            let pose = filter.best_pose();
            info!(
                "Cycle {}: pose ({:.2}, {:.2}, {:.3}), score {}, effective particles {:.1}",
                cycle,
                pose.x,
                pose.y,
                pose.theta,
                filter.best_score(),
                filter.effective_sample_size()
            );
        }
    })?;
    info!(
        "Used {} odometry samples, {} left over",
        timeline.motion().read_count(),
        timeline.motion().remaining()
    );

    if let Some(truth) = truth {
        // the filter starts in its own frame at the zero pose
        let start = config.simulator.start;
        info!(
            "Final pose ({:.2}, {:.2}, {:.3}), true motion ({:.2}, {:.2}, {:.3})",
            summary.final_pose.x,
            summary.final_pose.y,
            summary.final_pose.theta,
            truth.x - start.x,
            truth.y - start.y,
            truth.theta - start.theta
        );
    }

    Ok(summary)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn replay_small_room() {
        let config = Config::from_contents(
            r#"
settings: { report_every: 1 }
lidar: { angle_min: 0.0, angle_max: 359.0, beams: 360 }
slam:
  particles: 5
  seed: 1
  grid: { x_min: -10.0, y_min: -10.0, x_max: 10.0, y_max: 10.0, resolution: 0.5 }
simulator:
  scene:
    - !Rectangle { x: -5.0, y: -5.0, width: 10.0, height: 10.0 }
  parameters: { dt: 0.1, steps_per_scan: 5 }
  commands:
    - { speed: 0.5, turn_rate: 0.0, duration: 2.0 }
"#,
        )
        .unwrap();

        let summary = replay(&config).unwrap();

        // 20 steps give 4 sweeps after the initial one
        assert_eq!(summary.cycles, 4);
        assert_eq!(summary.cycle_stats.sample_count(), 4);
        assert!(summary.occupied_cells > 0);
    }
}
