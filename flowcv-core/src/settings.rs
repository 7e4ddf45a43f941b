//! Cross-validation configuration.
//!
//! One explicit [`CvSettings`] value carries everything a run needs,
//! including the log level; nothing is read from process-wide state after
//! construction. `Default` reads a few `FLOWCV_*` environment overrides.

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

use crate::error::{CvError, CvResult};
use crate::solvers::{BbSettings, DoreSettings, LbfgsSettings, StoppingCriteria};

/// Recognized log levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Settings of a cross-validation run.
#[derive(Debug, Clone)]
pub struct CvSettings {
    /// Number of folds
    pub k: usize,

    /// Shuffle observation indices before splitting, with this seed
    pub shuffle_seed: Option<u64>,

    /// Level the driver should install for this run
    pub log_level: LogLevel,

    /// Number of volume bins for per-bin metrics
    pub nbins: usize,

    /// Checkpoint cadence (iterations)
    pub record_every: usize,

    pub stopping: StoppingCriteria,
    pub lbfgs: LbfgsSettings,
    pub bb: BbSettings,
    pub dore: DoreSettings,
}

impl Default for CvSettings {
    fn default() -> Self {
        let record_every = std::env::var("FLOWCV_RECORD_EVERY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(5);

        Self {
            k: 3,
            shuffle_seed: None,
            log_level: LogLevel::default(),
            nbins: 6,
            record_every,
            stopping: StoppingCriteria::default(),
            lbfgs: LbfgsSettings::default(),
            bb: BbSettings::default(),
            dore: DoreSettings::default(),
        }
    }
}

impl CvSettings {
    /// Check ranges of all knobs.
    pub fn validate(&self) -> CvResult<()> {
        let invalid = |msg: String| Err(CvError::InvalidSettings(msg));

        if self.k < 2 {
            return invalid(format!("k must be at least 2, got {}", self.k));
        }
        if self.record_every == 0 {
            return invalid("record_every must be positive".to_string());
        }
        if self.nbins == 0 {
            return invalid("nbins must be positive".to_string());
        }
        if self.stopping.max_iter == 0 {
            return invalid("max_iter must be positive".to_string());
        }
        if !(self.dore.alpha > 0.0 && self.dore.alpha < 1.0) {
            return invalid(format!("DORE alpha must lie in (0, 1), got {}", self.dore.alpha));
        }
        if self.dore.power_iters == 0 {
            return invalid("power_iters must be positive".to_string());
        }
        self.lbfgs.line_search.validate().map_err(CvError::InvalidSettings)?;
        self.bb.validate().map_err(CvError::InvalidSettings)?;
        Ok(())
    }
}
