use std::collections::HashMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use dispatcher::{PhaseTable, PhaseTables};
use market::detector::{DEFAULT_CRASH_THRESHOLD_PCT, DetectionMode, DetectorConfig};
use market::event::EventType;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    // =========================
    // Dispatch
    // =========================
    /// EnabledFlag used when nothing has been persisted yet.
    pub events_enabled_default: bool,

    /// Total presentation time per event type. Each phase table stretches
    /// its `hold` phase to match.
    pub durations: HashMap<EventType, Duration>,

    /// Bound of the runtime command channel. Acts as backpressure on feeds.
    pub command_queue_capacity: usize,

    // =========================
    // Detection
    // =========================
    pub detection_mode: DetectionMode,
    pub crash_threshold_pct: f64,
    pub snapshots_per_day: Option<u32>,

    // =========================
    // Settings persistence
    // =========================
    /// When set, settings live in SQLite instead of the JSON file.
    pub settings_database_url: Option<String>,
    pub settings_path: PathBuf,
    pub settings_key: String,

    // =========================
    // Transport
    // =========================
    pub feed_ws_url: Option<String>,
    pub feed_http_url: Option<String>,
    pub feed_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source, falling back to defaults
    /// for missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let durations = EventType::ALL
            .into_iter()
            .map(|kind| {
                let default_ms = PhaseTable::default_for(kind).total().as_millis() as u64;
                let ms = parse_or(&lookup, duration_var(kind), default_ms);
                (kind, Duration::from_millis(ms))
            })
            .collect();

        let snapshots_per_day = match parse_or(&lookup, "SNAPSHOTS_PER_MARKET_DAY", 30u32) {
            0 => None,
            n => Some(n),
        };

        Self {
            events_enabled_default: parse_or(&lookup, "EVENTS_ENABLED_DEFAULT", true),
            durations,
            command_queue_capacity: parse_or(&lookup, "COMMAND_QUEUE_CAPACITY", 256usize).max(1),

            detection_mode: parse_or(&lookup, "DETECTION_MODE", DetectionMode::Local),
            crash_threshold_pct: parse_or(
                &lookup,
                "CRASH_THRESHOLD_PCT",
                DEFAULT_CRASH_THRESHOLD_PCT,
            ),
            snapshots_per_day,

            settings_database_url: non_empty("SETTINGS_DATABASE_URL"),
            settings_path: non_empty("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/settings.json")),
            settings_key: non_empty("SETTINGS_KEY").unwrap_or_else(|| "celebrations".to_string()),

            feed_ws_url: non_empty("FEED_WS_URL"),
            feed_http_url: non_empty("FEED_HTTP_URL"),
            feed_poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "FEED_POLL_INTERVAL_MS",
                10_000u64,
            )),
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            crash_threshold_pct: self.crash_threshold_pct,
            snapshots_per_day: self.snapshots_per_day,
        }
    }

    pub fn phase_tables(&self) -> PhaseTables {
        PhaseTables::with_totals(|kind| {
            self.durations
                .get(&kind)
                .copied()
                .unwrap_or_else(|| PhaseTable::default_for(kind).total())
        })
    }
}

fn duration_var(kind: EventType) -> &'static str {
    match kind {
        EventType::NewLeader => "NEW_LEADER_DURATION_MS",
        EventType::AllTimeHigh => "ALL_TIME_HIGH_DURATION_MS",
        EventType::Crash => "CRASH_DURATION_MS",
        EventType::MarketOpen => "MARKET_OPEN_DURATION_MS",
        EventType::MarketClose => "MARKET_CLOSE_DURATION_MS",
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(v) => v,
        Err(e) => {
            warn!(key, value = %raw, error = %e, "invalid config value, using default");
            default
        }
    }
}
