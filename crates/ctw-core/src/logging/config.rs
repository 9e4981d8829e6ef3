//! Logging configuration.
//!
//! Supports configuration via:
//! - Environment variables (CTW_LOG, RUST_LOG, CTW_LOG_FORMAT, CTW_LOG_TIMESTAMPS)
//! - CLI flags (-v/-q, --log-format, --log-timestamps)

use serde::{Deserialize, Serialize};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console format (default).
    #[default]
    Human,
    /// Machine-parseable JSON lines.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            _ => Err(format!("unknown log format `{s}` (expected human or jsonl)")),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum level of emitted events, quietest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every tree update.
    Trace,
    /// Per-variable selection progress, rollbacks.
    Debug,
    /// Per-tree and per-corpus summaries.
    Info,
    #[default]
    Warn,
    Error,
    Off,
}

const LEVELS: [LogLevel; 6] = [
    LogLevel::Trace,
    LogLevel::Debug,
    LogLevel::Info,
    LogLevel::Warn,
    LogLevel::Error,
    LogLevel::Off,
];

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// One step more verbose; `Trace` stays `Trace`.
    pub fn louder(self) -> Self {
        let i = LEVELS.iter().position(|&l| l == self).unwrap_or(0);
        LEVELS[i.saturating_sub(1)]
    }

    /// The most verbose level named anywhere in a `RUST_LOG`-style directive
    /// list such as `warn,ctw_core=debug`.
    fn loudest_in_directives(directives: &str) -> Option<Self> {
        directives
            .split(',')
            .filter_map(|d| d.rsplit('=').next())
            .filter_map(|level| level.trim().parse().ok())
            .min()
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();
        match s.as_str() {
            "warning" => Ok(LogLevel::Warn),
            "none" | "quiet" => Ok(LogLevel::Off),
            _ => LEVELS
                .into_iter()
                .find(|l| l.as_str() == s)
                .ok_or_else(|| format!("unknown log level `{s}`")),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how the `ctw` binary logs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Prefix human output with timestamps; JSON lines always carry them.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Warn,
            timestamps: false,
        }
    }
}

impl LogConfig {
    /// `CTW_LOG` or `RUST_LOG`, then `CTW_LOG_FORMAT` and
    /// `CTW_LOG_TIMESTAMPS`. CLI flags are applied on top with the builders.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = LogConfig::default();

        // CTW_LOG wins over RUST_LOG even when it does not parse.
        if let Some(val) = lookup("CTW_LOG") {
            if let Ok(level) = val.parse::<LogLevel>() {
                config.level = level;
            }
        } else if let Some(level) = lookup("RUST_LOG")
            .as_deref()
            .and_then(LogLevel::loudest_in_directives)
        {
            config.level = level;
        }

        if let Some(val) = lookup("CTW_LOG_FORMAT") {
            if let Ok(format) = val.parse::<LogFormat>() {
                config.format = format;
            }
        }
        if let Some(val) = lookup("CTW_LOG_TIMESTAMPS") {
            config.timestamps = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        config
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }
}
