//! Tracing subscriber installation
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `RUST_LOG`, falling
//! back to the levels configured on the builder.

use anyhow::{Result, anyhow};
use std::io::Write;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{Directive, LevelFilter};

static SUBSCRIBER_INSTALLED: Mutex<bool> = Mutex::new(false);

pub struct TelemetryGuardBuilder {
    max_level: LevelFilter,
    target_max_levels: Vec<(String, LevelFilter)>,
    ansi: bool,
}

impl Default for TelemetryGuardBuilder {
    fn default() -> Self {
        Self {
            max_level: LevelFilter::INFO,
            target_max_levels: Vec::new(),
            ansi: true,
        }
    }
}

impl TelemetryGuardBuilder {
    #[must_use]
    pub fn with_target_max_level(mut self, target: &str, level_filter: LevelFilter) -> Self {
        self.target_max_levels.push((target.to_string(), level_filter));
        self
    }

    #[must_use]
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::builder()
            .with_default_directive(self.max_level.into())
            .from_env_lossy();
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
            for (target, level) in &self.target_max_levels {
                let directive: Directive = format!("{target}={level}")
                    .parse()
                    .map_err(|e| anyhow!("invalid level for target {target}: {e}"))?;
                filter = filter.add_directive(directive);
            }
        }
        Ok(filter)
    }

    /// Install the global subscriber, once per process
    pub fn build(self) -> Result<TelemetryGuard> {
        let mut installed = SUBSCRIBER_INSTALLED
            .lock()
            .map_err(|_| anyhow!("telemetry installation lock poisoned"))?;
        if !*installed {
            tracing_subscriber::fmt()
                .with_env_filter(self.env_filter()?)
                .with_ansi(self.ansi)
                .try_init()
                .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
            *installed = true;
        }
        Ok(TelemetryGuard { _private: () })
    }
}

/// Keeps telemetry alive for the scope of `main`, flushes stdout on drop
pub struct TelemetryGuard {
    _private: (),
}

impl TelemetryGuard {
    pub fn new() -> Result<Self> {
        TelemetryGuardBuilder::default().build()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let _ = std::io::stdout().flush();
    }
}
