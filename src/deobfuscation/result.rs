//! Deobfuscation result types.
//!
//! This module contains the [`DeobfuscationResult`] struct which encapsulates
//! the outcome of running the deobfuscation engine on a module.

use std::time::Duration;

use serde::Serialize;

use crate::deobfuscation::changes::{DerivedStats, EventLog};

/// Result of running deobfuscation.
///
/// Contains the event log capturing all activity during deobfuscation. Statistics are
/// derived from the event log on demand.
///
/// # Example
///
/// ```rust,no_run
/// use cryptoscope::deobfuscation::{DeobfuscationEngine, EngineConfig};
/// use cryptoscope::metadata::Module;
///
/// let engine = DeobfuscationEngine::new(EngineConfig::proxies_only());
/// let mut module = Module::new("app.exe");
/// let result = engine.process(&mut module, &[])?;
///
/// println!("Events: {}", result.events.len());
/// println!("Stats: {}", result.stats().summary());
/// # Ok::<(), cryptoscope::Error>(())
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeobfuscationResult {
    /// All events from the deobfuscation run.
    pub events: EventLog,
    /// Total processing time.
    pub total_time: Duration,
}

impl DeobfuscationResult {
    /// Creates a new deobfuscation result.
    #[must_use]
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            total_time: Duration::ZERO,
        }
    }

    /// Sets timing info.
    #[must_use]
    pub fn with_timing(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Computes statistics derived from the event log.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        DerivedStats::from_log(&self.events).with_time(self.total_time)
    }

    /// Generates a human-readable summary of the deobfuscation results.
    #[must_use]
    pub fn summary(&self) -> String {
        self.stats().summary()
    }

    /// Returns true if the run changed the module.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.events.transformation_count() > 0
    }
}
