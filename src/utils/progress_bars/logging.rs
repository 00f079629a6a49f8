// src/utils/progress_bars/logging.rs - Stage-tagged logging helpers for the offline pipeline
use log::{debug, info, warn};
use std::time::Instant;

use crate::model::metrics::RegressionMetrics;
use crate::model::regressor::ModelFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Preprocess,
    Train,
    Store,
}

#[derive(Clone)]
pub struct TrainingLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl TrainingLogger {
    pub fn new(stage: PipelineStage) -> Self {
        let (stage_name, stage_emoji) = match stage {
            PipelineStage::Preprocess => ("PREPROCESS", "🧹"),
            PipelineStage::Train => ("TRAIN", "🤖"),
            PipelineStage::Store => ("STORE", "💾"),
        };
        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        match details {
            Some(details) => info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name,
                self.stage_emoji,
                phase,
                details,
                elapsed.as_secs_f32()
            ),
            None => info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name,
                self.stage_emoji,
                phase,
                elapsed.as_secs_f32()
            ),
        }
    }

    pub fn log_row_counts(&self, step: &str, before: usize, after: usize) {
        let dropped = before.saturating_sub(after);
        info!(
            "[{}] {} 📊 {}: {} rows → {} rows ({} dropped)",
            self.stage_name, self.stage_emoji, step, before, after, dropped
        );
    }

    pub fn log_candidate_score(&self, family: ModelFamily, mean: f64, std_dev: f64) {
        info!(
            "[{}] {} 📈 {}: cross-validation R² {:.4} (+/- {:.4})",
            self.stage_name,
            self.stage_emoji,
            family,
            mean,
            std_dev * 2.0
        );
    }

    pub fn log_candidate_skipped(&self, family: ModelFamily, reason: &str) {
        warn!(
            "[{}] {} ⏭️  Skipping {}: {}",
            self.stage_name, self.stage_emoji, family, reason
        );
    }

    pub fn log_grid_config(&self, index: usize, total: usize, description: &str, score: f64) {
        debug!(
            "[{}] {} grid {}/{} {} → R² {:.4}",
            self.stage_name, self.stage_emoji, index + 1, total, description, score
        );
    }

    pub fn log_final_metrics(&self, family: ModelFamily, metrics: &RegressionMetrics) {
        info!(
            "[{}] {} ✅ Final model ({}) R² {:.4}, MSE {:.2e}, MAE {:.2e}",
            self.stage_name, self.stage_emoji, family, metrics.r2, metrics.mse, metrics.mae
        );
    }

    pub fn log_completion(&self, summary: &str) {
        info!(
            "[{}] {} 🏁 {} in {:.2}s",
            self.stage_name,
            self.stage_emoji,
            summary,
            self.start_time.elapsed().as_secs_f64()
        );
    }
}
