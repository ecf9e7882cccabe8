// Engine timing and mix settings. Every field has a default, so a config file
// only needs the keys it wants to override.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,   // how often the clock thread wakes up
    pub lookahead_secs: f64,     // how far ahead of the audio clock we dispatch
    pub start_delay_secs: f64,   // gap between pressing play and the first step
    pub note_duration_secs: f64, // gate length handed to every bass note
    pub live_master_gain: f32,
    pub render_master_gain: f32,
    pub render_tail_secs: f64, // silence appended so the last release rings out
    pub render_sample_rate: u32,
    pub bpm: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 25,
            lookahead_secs: 0.1,
            start_delay_secs: 0.05,
            note_duration_secs: 0.25,
            live_master_gain: 0.7,
            render_master_gain: 0.6,
            render_tail_secs: 2.0,
            render_sample_rate: 44_100,
            bpm: 174.0,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would stall or flood the scheduling loop.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidConfig(format!("{name} must be positive, got {v}")))
            }
        };
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be positive".into()));
        }
        positive("lookahead_secs", self.lookahead_secs)?;
        positive("note_duration_secs", self.note_duration_secs)?;
        positive("bpm", self.bpm)?;
        if !(self.start_delay_secs.is_finite() && self.start_delay_secs >= 0.0) {
            return Err(Error::InvalidConfig("start_delay_secs must be >= 0".into()));
        }
        if !(self.render_tail_secs.is_finite() && self.render_tail_secs >= 0.0) {
            return Err(Error::InvalidConfig("render_tail_secs must be >= 0".into()));
        }
        if self.render_sample_rate < 8_000 {
            return Err(Error::InvalidConfig(format!(
                "render_sample_rate {} is too low",
                self.render_sample_rate
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "bpm": 140.0 }"#).unwrap();
        assert_eq!(config.bpm, 140.0);
        assert_eq!(config.poll_interval_ms, 25);
        assert_eq!(config.render_sample_rate, 44_100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_timing() {
        let mut config = EngineConfig::default();
        config.lookahead_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.note_duration_secs = -0.25;
        assert!(config.validate().is_err());
    }
}
