//! Orchestration engine configuration
//!
//! Tunables for conversation memory, classifier confidence, and the
//! inactivity sweeper. Defaults match the engine's documented behavior
//! (window W=20, retained K=8, summarize threshold T=5).

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Orchestration engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Maximum retained conversation turns per session (W)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Turns kept after a summarization pass (K, must be < W)
    #[serde(default = "default_retained_after_summary")]
    pub retained_after_summary: usize,

    /// Summarize every T committed messages (T)
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: u64,

    /// Classifier confidence floor; below it the deterministic default wins
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,

    /// Seconds of inactivity before a session's memory is swept
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Interval of the background sweep task, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Capacity of each execution's streaming event channel
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl EngineConfig {
    /// Session inactivity threshold as a Duration
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Sweep interval as a Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate engine configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.retained_after_summary == 0 || self.retained_after_summary >= self.window_size {
            return Err(ValidationError::InvalidMemoryWindow);
        }
        if self.summarize_threshold == 0 {
            return Err(ValidationError::InvalidSummarizeThreshold);
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return Err(ValidationError::InvalidConfidenceFloor);
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            retained_after_summary: default_retained_after_summary(),
            summarize_threshold: default_summarize_threshold(),
            confidence_floor: default_confidence_floor(),
            session_idle_secs: default_session_idle_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_window_size() -> usize {
    20
}

fn default_retained_after_summary() -> usize {
    8
}

fn default_summarize_threshold() -> u64 {
    5
}

fn default_confidence_floor() -> f32 {
    0.7
}

fn default_session_idle_secs() -> u64 {
    1800
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_stream_buffer() -> usize {
    64
}
