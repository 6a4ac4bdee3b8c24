//! Simulation driver: sequences noise sampling, filter stepping, and
//! session recording.
//!
//! One call to [`Simulation::step`] is one trigger of the estimator:
//! draw a control vector and two noise vectors, hand them to the core,
//! and append the resulting snapshot to the in-memory history. A step
//! that fails inside the core is logged and skipped; the filter holds
//! its previous belief and the run continues.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::filters::wall_kf::{FilterConfig, FilterSnapshot, StepInput, WallFilter};
use crate::filters::FilterResult;
use crate::noise::{NoiseProfile, NoiseSampler};
use crate::types::Mat2;

/// Everything a session file records: run parameters plus the full
/// step history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionOutput {
    pub created: String,
    pub seed: u64,
    pub walls: (f64, f64),
    pub noise: NoiseProfile,
    pub skipped_steps: u64,
    pub steps: Vec<FilterSnapshot>,
}

pub struct Simulation {
    filter: WallFilter,
    sampler: NoiseSampler,
    process_noise_cov: Mat2,
    measurement_noise_cov: Mat2,
    profile: NoiseProfile,
    seed: u64,
    history: Vec<FilterSnapshot>,
    skipped: u64,
}

impl Simulation {
    pub fn new(
        config: FilterConfig,
        profile: NoiseProfile,
        process_noise_cov: Mat2,
        measurement_noise_cov: Mat2,
        seed: u64,
    ) -> Result<Self> {
        let filter = WallFilter::new(config).context("invalid filter configuration")?;
        let sampler = NoiseSampler::new(&profile, seed)?;
        Ok(Self {
            filter,
            sampler,
            process_noise_cov,
            measurement_noise_cov,
            profile,
            seed,
            history: Vec::new(),
            skipped: 0,
        })
    }

    /// The demo scenario: default filter config, default noise profile,
    /// process noise covariance [[0.3, 0], [0, 0.4]] and measurement
    /// noise covariance [[0.4, 0], [0, 0.4]].
    pub fn demo(seed: u64) -> Result<Self> {
        Self::new(
            FilterConfig::default(),
            NoiseProfile::default(),
            Mat2::new(0.3, 0.0, 0.0, 0.4),
            Mat2::new(0.4, 0.0, 0.0, 0.4),
            seed,
        )
    }

    /// Advance one full cycle with freshly drawn noise.
    pub fn step(&mut self) -> FilterResult<FilterSnapshot> {
        let input = StepInput {
            control: self.sampler.control(),
            process_noise: self.sampler.process_noise(),
            measurement_noise: self.sampler.measurement_noise(),
            process_noise_cov: self.process_noise_cov,
            measurement_noise_cov: self.measurement_noise_cov,
        };
        match self.filter.step(&input) {
            Ok(snapshot) => {
                log::debug!(
                    "step {}: truth ({:.3}, {:.3}), corrected ({:.3}, {:.3})",
                    snapshot.step,
                    snapshot.true_position.0,
                    snapshot.true_position.1,
                    snapshot.corrected_mean.0,
                    snapshot.corrected_mean.1,
                );
                self.history.push(snapshot.clone());
                Ok(snapshot)
            }
            Err(err) => {
                self.skipped += 1;
                log::warn!("skipping step, holding previous belief: {err}");
                Err(err)
            }
        }
    }

    pub fn filter(&self) -> &WallFilter {
        &self.filter
    }

    /// Current snapshot, valid even before the first step.
    pub fn latest(&self) -> FilterSnapshot {
        self.filter.snapshot()
    }

    pub fn history(&self) -> &[FilterSnapshot] {
        &self.history
    }

    pub fn skipped_steps(&self) -> u64 {
        self.skipped
    }

    /// Write the session as pretty JSON under `dir`, returning the
    /// path of the new file.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;
        let walls = self.filter.walls();
        let output = SessionOutput {
            created: Utc::now().to_rfc3339(),
            seed: self.seed,
            walls: (walls.x, walls.y),
            noise: self.profile,
            skipped_steps: self.skipped,
            steps: self.history.clone(),
        };
        let path = dir.join(format!(
            "session_{}.json",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let json = serde_json::to_string_pretty(&output)?;
        fs::write(&path, json)
            .with_context(|| format!("failed to write session file {}", path.display()))?;
        log::info!("saved {} steps to {}", self.history.len(), path.display());
        Ok(path)
    }
}
