//! Species Definition Structures
//!
//! Species are loaded from TOML and describe how a pet of that kind
//! behaves: need decay, waste, ageing, noises and item preferences.

use serde::{Deserialize, Serialize};

/// Need decay applied every decay interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedDecay {
    pub happiness: i32,
    pub hunger: i32,
    pub thirst: i32,
    pub health: i32,
}

impl Default for NeedDecay {
    fn default() -> Self {
        Self {
            happiness: 1,
            hunger: 2,
            thirst: 2,
            health: 0,
        }
    }
}

// ============================================================================
// Raw TOML Structures (direct deserialization)
// ============================================================================

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSpeciesDefinition {
    pub display_name: Option<String>,
    #[serde(default)]
    pub breeds: Vec<String>,
    #[serde(default)]
    pub noises: Vec<String>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    pub max_stat: Option<i32>,
    #[serde(default)]
    pub decay: NeedDecay,
    pub decay_interval_ticks: Option<u64>,
    pub waste_interval_ticks: Option<u64>,
    pub max_waste: Option<i32>,
    pub age_interval_seconds: Option<u64>,
}

// ============================================================================
// Resolved Species
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesDefinition {
    pub id: String,
    pub display_name: String,
    pub breeds: Vec<String>,
    pub noises: Vec<String>,
    pub likes: Vec<String>,
    pub dislikes: Vec<String>,
    pub max_stat: i32,
    pub decay: NeedDecay,
    pub decay_interval_ticks: u64,
    pub waste_interval_ticks: u64,
    pub max_waste: i32,
    pub age_interval_seconds: u64,
}

impl SpeciesDefinition {
    pub fn from_raw(id: &str, raw: &RawSpeciesDefinition) -> Self {
        Self {
            id: id.to_string(),
            display_name: raw.display_name.clone()
                .unwrap_or_else(|| id.to_string()),
            breeds: raw.breeds.clone(),
            noises: raw.noises.clone(),
            likes: raw.likes.clone(),
            dislikes: raw.dislikes.clone(),
            max_stat: raw.max_stat.unwrap_or(100).max(1),
            decay: raw.decay,
            // Intervals of zero would never fire, clamp to one tick
            decay_interval_ticks: raw.decay_interval_ticks.unwrap_or(20).max(1),
            waste_interval_ticks: raw.waste_interval_ticks.unwrap_or(600).max(1),
            max_waste: raw.max_waste.unwrap_or(5).max(0),
            age_interval_seconds: raw.age_interval_seconds.unwrap_or(300).max(1),
        }
    }

    /// A species with all defaults, used for the fallback animal and in tests
    pub fn basic(id: &str) -> Self {
        Self::from_raw(id, &RawSpeciesDefinition::default())
    }

    /// The breed to use when none was requested
    pub fn default_breed(&self) -> String {
        self.breeds.first().cloned().unwrap_or_else(|| self.id.clone())
    }
}
