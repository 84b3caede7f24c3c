//! Engine configuration loaded from the environment.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | STORY_CHECK_INTERVAL | 30 | Seconds between evaluation ticks. |
//! | MIN_STORY_GAP_MINUTES | 10 | Minimum spacing between two deliveries. |
//! | MAX_STORIES_PER_HOUR | 4 | Cap on deliveries in any trailing hour. |
//! | PROXIMITY_RADIUS_METERS | 2000 | POIs farther than this never become candidates. |
//! | POI_REFRESH_DISTANCE_METERS | 1000 | Movement that triggers a POI lookup. |
//! | POI_LOOKUP_RADIUS_METERS | 5000 | Half-size of the lookup bounding box. |
//! | POI_CACHE_TTL_SECONDS | 600 | Age after which cached POIs are refreshed. |
//! | MAX_PLAUSIBLE_SPEED_KMH | 300 | Samples implying a faster jump are discarded. |
//! | PASSED_POI_CANCEL_METERS | 500 | Distance behind the vehicle that invalidates a candidate. |
//! | GENERATION_TIMEOUT_MS | 4000 | Per-attempt text generation timeout. |
//! | SYNTHESIS_TIMEOUT_MS | 3000 | Speech synthesis timeout. |
//! | SPATIAL_TIMEOUT_MS | 2000 | Spatial audio timeout. |
//! | POI_LOOKUP_TIMEOUT_MS | 2000 | Per-attempt POI lookup timeout. |
//! | RETRY_BACKOFF_MS | 250 | Base backoff before the single retry. |
//! | MIN_RELEVANCE_SCORE | 0.2 | Candidates scoring below this are not delivered. |
//! | AMBIENT_SCORE | 0.3 | Score of the POI-less ambient fallback. |
//! | PENDING_MAX_AGE_SECONDS | 120 | Pending playback older than this is discarded. |
//! | STORY_TIER / TRIVIA_TIER / SUGGESTION_TIER / FILLER_TIER | story, story, story, ambient | Playback tier per content type. |

use std::time::Duration;

use chrono::TimeDelta;

use crate::error::ConfigError;
use crate::kernel::content::ContentKind;
use crate::kernel::playback::PriorityTier;
use crate::kernel::selector::ScoringWeights;

#[derive(Debug, Clone)]
pub struct CallTimeouts {
    pub generation: Duration,
    pub synthesis: Duration,
    pub spatial: Duration,
    pub poi_lookup: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            generation: Duration::from_millis(4000),
            synthesis: Duration::from_millis(3000),
            spatial: Duration::from_millis(2000),
            poi_lookup: Duration::from_millis(2000),
        }
    }
}

/// Playback tier assigned to each kind of generated content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTiers {
    pub story: PriorityTier,
    pub trivia: PriorityTier,
    pub suggestion: PriorityTier,
    pub filler: PriorityTier,
}

impl Default for ContentTiers {
    fn default() -> Self {
        Self {
            story: PriorityTier::Story,
            trivia: PriorityTier::Story,
            suggestion: PriorityTier::Story,
            filler: PriorityTier::AmbientFiller,
        }
    }
}

impl ContentTiers {
    pub fn tier_for(&self, kind: ContentKind) -> PriorityTier {
        match kind {
            ContentKind::Story => self.story,
            ContentKind::Trivia | ContentKind::Fact => self.trivia,
            ContentKind::BookingSuggestion => self.suggestion,
            ContentKind::Ambient => self.filler,
            // External alerts carry their own tier; this is only a floor.
            ContentKind::Alert => PriorityTier::SafetyNotice,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub story_check_interval: Duration,
    pub min_story_gap: TimeDelta,
    pub max_stories_per_hour: u32,
    pub proximity_radius_m: f64,
    pub poi_refresh_distance_m: f64,
    pub poi_lookup_radius_m: f64,
    pub poi_cache_ttl: TimeDelta,
    pub max_plausible_speed_kmh: f64,
    pub passed_poi_cancel_m: f64,
    pub timeouts: CallTimeouts,
    pub retry_backoff: Duration,
    pub min_relevance_score: f64,
    pub ambient_score: f64,
    pub pending_max_age: TimeDelta,
    pub tiers: ContentTiers,
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            story_check_interval: Duration::from_secs(30),
            min_story_gap: TimeDelta::minutes(10),
            max_stories_per_hour: 4,
            proximity_radius_m: 2000.0,
            poi_refresh_distance_m: 1000.0,
            poi_lookup_radius_m: 5000.0,
            poi_cache_ttl: TimeDelta::seconds(600),
            max_plausible_speed_kmh: 300.0,
            passed_poi_cancel_m: 500.0,
            timeouts: CallTimeouts::default(),
            retry_backoff: Duration::from_millis(250),
            min_relevance_score: 0.2,
            ambient_score: 0.3,
            pending_max_age: TimeDelta::seconds(120),
            tiers: ContentTiers::default(),
            weights: ScoringWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load from environment. Unset variables take defaults; malformed or
    /// non-positive values are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let timeouts = CallTimeouts {
            generation: env_millis("GENERATION_TIMEOUT_MS", defaults.timeouts.generation)?,
            synthesis: env_millis("SYNTHESIS_TIMEOUT_MS", defaults.timeouts.synthesis)?,
            spatial: env_millis("SPATIAL_TIMEOUT_MS", defaults.timeouts.spatial)?,
            poi_lookup: env_millis("POI_LOOKUP_TIMEOUT_MS", defaults.timeouts.poi_lookup)?,
        };
        let tiers = ContentTiers {
            story: env_tier("STORY_TIER", defaults.tiers.story)?,
            trivia: env_tier("TRIVIA_TIER", defaults.tiers.trivia)?,
            suggestion: env_tier("SUGGESTION_TIER", defaults.tiers.suggestion)?,
            filler: env_tier("FILLER_TIER", defaults.tiers.filler)?,
        };

        let config = Self {
            story_check_interval: Duration::from_secs(env_positive("STORY_CHECK_INTERVAL", defaults.story_check_interval.as_secs())?),
            min_story_gap: TimeDelta::minutes(env_positive("MIN_STORY_GAP_MINUTES", defaults.min_story_gap.num_minutes() as u64)? as i64),
            max_stories_per_hour: env_positive("MAX_STORIES_PER_HOUR", u64::from(defaults.max_stories_per_hour))? as u32,
            proximity_radius_m: env_f64("PROXIMITY_RADIUS_METERS", defaults.proximity_radius_m)?,
            poi_refresh_distance_m: env_f64("POI_REFRESH_DISTANCE_METERS", defaults.poi_refresh_distance_m)?,
            poi_lookup_radius_m: env_f64("POI_LOOKUP_RADIUS_METERS", defaults.poi_lookup_radius_m)?,
            poi_cache_ttl: TimeDelta::seconds(env_positive("POI_CACHE_TTL_SECONDS", defaults.poi_cache_ttl.num_seconds() as u64)? as i64),
            max_plausible_speed_kmh: env_f64("MAX_PLAUSIBLE_SPEED_KMH", defaults.max_plausible_speed_kmh)?,
            passed_poi_cancel_m: env_f64("PASSED_POI_CANCEL_METERS", defaults.passed_poi_cancel_m)?,
            timeouts,
            retry_backoff: env_millis("RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            min_relevance_score: env_f64("MIN_RELEVANCE_SCORE", defaults.min_relevance_score)?,
            ambient_score: env_f64("AMBIENT_SCORE", defaults.ambient_score)?,
            pending_max_age: TimeDelta::seconds(env_positive("PENDING_MAX_AGE_SECONDS", defaults.pending_max_age.num_seconds() as u64)? as i64),
            tiers,
            weights: defaults.weights,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject anything that would leave pacing or timeouts undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive_duration("STORY_CHECK_INTERVAL", self.story_check_interval)?;
        positive_delta("MIN_STORY_GAP_MINUTES", self.min_story_gap)?;
        if self.max_stories_per_hour == 0 {
            return Err(ConfigError::NonPositive {
                name: "MAX_STORIES_PER_HOUR",
                value: "0".to_string(),
            });
        }
        positive_f64("PROXIMITY_RADIUS_METERS", self.proximity_radius_m)?;
        positive_f64("POI_REFRESH_DISTANCE_METERS", self.poi_refresh_distance_m)?;
        positive_f64("POI_LOOKUP_RADIUS_METERS", self.poi_lookup_radius_m)?;
        positive_delta("POI_CACHE_TTL_SECONDS", self.poi_cache_ttl)?;
        positive_f64("MAX_PLAUSIBLE_SPEED_KMH", self.max_plausible_speed_kmh)?;
        positive_f64("PASSED_POI_CANCEL_METERS", self.passed_poi_cancel_m)?;
        positive_duration("GENERATION_TIMEOUT_MS", self.timeouts.generation)?;
        positive_duration("SYNTHESIS_TIMEOUT_MS", self.timeouts.synthesis)?;
        positive_duration("SPATIAL_TIMEOUT_MS", self.timeouts.spatial)?;
        positive_duration("POI_LOOKUP_TIMEOUT_MS", self.timeouts.poi_lookup)?;
        positive_delta("PENDING_MAX_AGE_SECONDS", self.pending_max_age)?;
        unit_interval("MIN_RELEVANCE_SCORE", self.min_relevance_score)?;
        unit_interval("AMBIENT_SCORE", self.ambient_score)?;

        for (name, tier) in [
            ("STORY_TIER", self.tiers.story),
            ("TRIVIA_TIER", self.tiers.trivia),
            ("SUGGESTION_TIER", self.tiers.suggestion),
            ("FILLER_TIER", self.tiers.filler),
        ] {
            if tier >= PriorityTier::SafetyNotice {
                return Err(ConfigError::ReservedTier { name, tier });
            }
        }
        Ok(())
    }

    pub fn max_plausible_speed_mps(&self) -> f64 {
        self.max_plausible_speed_kmh / 3.6
    }
}

fn env_raw(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Parsed as signed so that negative input is reported as non-positive rather than unparseable.
fn env_positive(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let Some(raw) = env_raw(name) else {
        return Ok(default);
    };
    let value: i64 = raw.parse().map_err(|_| ConfigError::Unparseable {
        name,
        value: raw.clone(),
    })?;
    if value <= 0 {
        return Err(ConfigError::NonPositive { name, value: raw });
    }
    Ok(value as u64)
}

fn env_millis(name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    env_positive(name, default.as_millis() as u64).map(Duration::from_millis)
}

fn env_f64(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env_raw(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Unparseable { name, value: raw }),
        None => Ok(default),
    }
}

fn env_tier(name: &'static str, default: PriorityTier) -> Result<PriorityTier, ConfigError> {
    match env_raw(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::UnknownTier { name, value: raw }),
        None => Ok(default),
    }
}

fn positive_duration(name: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::NonPositive {
            name,
            value: format!("{value:?}"),
        });
    }
    Ok(())
}

fn positive_delta(name: &'static str, value: TimeDelta) -> Result<(), ConfigError> {
    if value <= TimeDelta::zero() {
        return Err(ConfigError::NonPositive {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn positive_f64(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositive {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange { name, value });
    }
    Ok(())
}
