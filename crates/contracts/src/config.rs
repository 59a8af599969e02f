use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PacingPreference {
    Calm,
    #[default]
    Balanced,
    Intense,
}

impl PacingPreference {
    /// Intensity the pacing stage steers toward.
    pub fn target(self) -> f64 {
        match self {
            Self::Calm => 0.3,
            Self::Balanced => 0.5,
            Self::Intense => 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    #[default]
    Deterministic,
    AiAssisted,
    AiPrimary,
}

/// The entire tuning surface of the director. Unknown keys in a serialized
/// config are a validation error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectorConfig {
    #[serde(default = "default_events_per_tick")]
    pub events_per_tick: u32,
    #[serde(default = "default_diversity_penalty")]
    pub diversity_penalty: f64,
    #[serde(default = "default_diversity_window")]
    pub diversity_window: u64,
    #[serde(default = "default_pacing_scale")]
    pub pacing_scale: f64,
    #[serde(default)]
    pub pacing_preference: PacingPreference,
    #[serde(default = "default_intensity_decay")]
    pub intensity_decay: f64,
    #[serde(default = "default_fallback_after_idle_ticks")]
    pub fallback_after_idle_ticks: u64,
    #[serde(default)]
    pub mode: EvaluationMode,
    #[serde(with = "crate::serde_seed", default)]
    pub rng_seed: u64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            events_per_tick: default_events_per_tick(),
            diversity_penalty: default_diversity_penalty(),
            diversity_window: default_diversity_window(),
            pacing_scale: default_pacing_scale(),
            pacing_preference: PacingPreference::default(),
            intensity_decay: default_intensity_decay(),
            fallback_after_idle_ticks: default_fallback_after_idle_ticks(),
            mode: EvaluationMode::default(),
            rng_seed: 0,
        }
    }
}

fn default_events_per_tick() -> u32 {
    1
}

fn default_diversity_penalty() -> f64 {
    0.5
}

fn default_diversity_window() -> u64 {
    5
}

fn default_pacing_scale() -> f64 {
    0.5
}

fn default_intensity_decay() -> f64 {
    0.1
}

fn default_fallback_after_idle_ticks() -> u64 {
    2
}
