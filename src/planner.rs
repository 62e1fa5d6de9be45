//! Retrying Cartesian path planner
//!
//! Asks the session for a straight-line path to a single target and, when the
//! path comes back partial or failed, retries with a jittered step resolution
//! and jump threshold. The search is bounded by the attempt count, not by wall
//! clock, and a partial result after the last attempt is only advisory.

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};
use crate::config::MoveLineConfig;
use crate::pose::{pose_to_list, translation_distance, Pose};
use crate::session::{ArmSession, Trajectory};
use crate::Result;

/// Base values and bounds for the retry loop
#[derive(Debug, Clone)]
pub struct PlannerParams {
    pub resolution_m: f64,
    pub jump_threshold: f64,
    pub max_attempts: u32,
    pub resolution_jitter_m: f64,
    pub jump_threshold_jitter: f64,
}

impl From<&MoveLineConfig> for PlannerParams {
    fn from(config: &MoveLineConfig) -> Self {
        Self {
            resolution_m: config.resolution_m,
            jump_threshold: config.jump_threshold,
            max_attempts: config.max_attempts,
            resolution_jitter_m: config.resolution_jitter_m,
            jump_threshold_jitter: config.jump_threshold_jitter,
        }
    }
}

/// One call to the planning backend
#[derive(Debug, Clone, Serialize)]
pub struct PlanAttempt<T> {
    pub index: u32,
    pub start_pose: Pose,
    pub target_pose: Pose,
    pub resolution_m: f64,
    pub jump_threshold: f64,
    /// `None` for a computation error, and for every attempt but the best
    /// once it is part of a [`PlanOutcome`]
    pub trajectory: Option<T>,
    pub fraction: f64,
    pub timestamp: DateTime<Local>,
}

impl<T> PlanAttempt<T> {
    pub fn is_error(&self) -> bool {
        self.fraction < 0.0
    }

    pub fn is_complete(&self) -> bool {
        self.fraction >= 1.0
    }

    pub fn is_partial(&self) -> bool {
        (0.0..1.0).contains(&self.fraction)
    }
}

/// All attempts of one planning run and the trajectory picked from them
///
/// Only the best attempt keeps its trajectory.
#[derive(Debug, Clone)]
pub struct PlanOutcome<T> {
    attempts: Vec<PlanAttempt<T>>,
    best: Option<usize>,
}

impl<T> PlanOutcome<T> {
    fn new() -> Self {
        Self {
            attempts: Vec::new(),
            best: None,
        }
    }

    fn push(&mut self, mut attempt: PlanAttempt<T>) {
        if attempt.trajectory.is_some() {
            match self.best {
                Some(best) if attempt.fraction <= self.attempts[best].fraction => {
                    attempt.trajectory = None;
                }
                previous => {
                    if let Some(previous) = previous {
                        self.attempts[previous].trajectory = None;
                    }
                    self.best = Some(self.attempts.len());
                }
            }
        }
        self.attempts.push(attempt);
    }

    pub fn attempts(&self) -> &[PlanAttempt<T>] {
        &self.attempts
    }

    /// Number of backend calls made
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    fn best_attempt(&self) -> Option<&PlanAttempt<T>> {
        self.best.map(|i| &self.attempts[i])
    }

    /// Best trajectory found, complete or not
    pub fn trajectory(&self) -> Option<&T> {
        self.best_attempt().and_then(|a| a.trajectory.as_ref())
    }

    /// Fraction achieved by [`PlanOutcome::trajectory`]
    pub fn fraction(&self) -> Option<f64> {
        self.best_attempt().map(|a| a.fraction)
    }

    /// Whether the picked trajectory covers the whole path
    pub fn is_complete(&self) -> bool {
        self.best_attempt().is_some_and(|a| a.is_complete())
    }
}

/// Writes plan attempts as JSON files for offline inspection
#[derive(Debug, Clone, Default)]
pub struct PlanRecorder {
    dir: Option<PathBuf>,
}

impl PlanRecorder {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// `<timestamp>_cm[<travel>]_f[<fraction>].json`
    pub fn file_name<T>(attempt: &PlanAttempt<T>, distance_m: f64) -> String {
        format!(
            "{}_cm[{}]_f[{:.0}%].json",
            attempt.timestamp.format("%Y%m%d_%H%M%S_%6f"),
            (distance_m * 100.0) as i64,
            attempt.fraction * 100.0
        )
    }

    /// Persist an attempt; failures are logged and swallowed
    pub async fn record<T: Serialize>(&self, attempt: &PlanAttempt<T>, distance_m: f64) {
        let Some(dir) = &self.dir else {
            return;
        };

        let path = dir.join(Self::file_name(attempt, distance_m));
        let contents = match serde_json::to_string_pretty(attempt) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to serialize plan attempt {}: {}", attempt.index, e);
                return;
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Failed to create {}: {}", dir.display(), e);
            return;
        }
        if let Err(e) = tokio::fs::write(&path, contents).await {
            warn!("Failed to write {}: {}", path.display(), e);
        }
    }
}

/// Bounded retry loop around [`ArmSession::compute_cartesian_path`]
pub struct CartesianPlanner {
    params: PlannerParams,
    rng: Box<dyn RngCore + Send>,
    recorder: PlanRecorder,
}

impl CartesianPlanner {
    pub fn new(params: PlannerParams, recorder: PlanRecorder) -> Self {
        Self {
            params,
            rng: Box::new(StdRng::from_os_rng()),
            recorder,
        }
    }

    /// Replace the jitter source, e.g. with a seeded generator
    pub fn with_rng<R: RngCore + Send + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    /// Step resolution and jump threshold for an attempt
    fn attempt_params(&mut self, index: u32) -> (f64, f64) {
        let params = &self.params;
        if index == 0 {
            return (params.resolution_m, params.jump_threshold);
        }
        let resolution_jitter = params.resolution_jitter_m;
        let jump_jitter = params.jump_threshold_jitter;
        let resolution_offset = self.rng.random_range(-resolution_jitter..=resolution_jitter);
        let jump_offset = self.rng.random_range(-jump_jitter..=jump_jitter);
        (
            self.params.resolution_m + resolution_offset,
            self.params.jump_threshold + jump_offset,
        )
    }

    /// Plan a straight-line path from `start` to `target`
    ///
    /// Stops at the first complete path or after `max_attempts` backend calls.
    /// Backend errors abort the search.
    pub async fn plan<S: ArmSession>(
        &mut self,
        session: &mut S,
        start: &Pose,
        target: &Pose,
    ) -> Result<PlanOutcome<S::Trajectory>> {
        let distance = translation_distance(start, target);
        let max_attempts = self.params.max_attempts;
        let mut outcome = PlanOutcome::new();

        for index in 0..max_attempts {
            if index > 0 {
                info!("trial [{}] / [{}]", index + 1, max_attempts);
            }
            let (resolution_m, jump_threshold) = self.attempt_params(index);

            info!("want to travel [{:.1} cm]", distance * 100.0);
            info!("with resolution_m=[{:.5}] and jump_threshold=[{:.3}]", resolution_m, jump_threshold);
            info!("... from start_pose =  {:?}", pose_to_list(start));
            info!("... to   target_pose = {:?}", pose_to_list(target));

            // The start pose stays out of the waypoints: the backend rejects
            // trajectories whose first two points share a timestamp.
            let waypoints = [*target];
            let (trajectory, fraction) = session
                .compute_cartesian_path(&waypoints, resolution_m, jump_threshold)
                .await?;

            info!("[{:.1}%] = fraction of the path achieved as described by the waypoints", fraction * 100.0);

            let trajectory = if fraction < 0.0 {
                error!("error with compute_cartesian_path");
                None
            } else {
                let n_points = trajectory.point_count();
                info!(
                    "[{}] points (resolution_m = {:.1} cm) -> path.length at most {:.1} cm",
                    n_points,
                    resolution_m * 100.0,
                    n_points as f64 * resolution_m * 100.0
                );
                if fraction < 1.0 {
                    error!("path not complete [{:.1}%]", fraction * 100.0);
                }
                Some(trajectory)
            };

            let attempt = PlanAttempt {
                index,
                start_pose: *start,
                target_pose: *target,
                resolution_m,
                jump_threshold,
                trajectory,
                fraction,
                timestamp: Local::now(),
            };
            self.recorder.record(&attempt, distance).await;

            let complete = attempt.is_complete();
            outcome.push(attempt);
            if complete {
                break;
            }
        }

        if !outcome.is_complete() {
            match outcome.fraction() {
                Some(fraction) => warn!(
                    "no complete path after {} trials, best achieved [{:.1}%]",
                    outcome.attempt_count(),
                    fraction * 100.0
                ),
                None => error!("no path at all after {} trials", outcome.attempt_count()),
            }
        }

        Ok(outcome)
    }
}
