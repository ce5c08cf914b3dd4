//! Event logging for the deobfuscation passes.
//!
//! Every observable decision of a pass is recorded as an [`Event`]: a resolved proxy, a
//! rewritten call site, a decrypted literal, a skipped candidate. Statistics are derived from
//! the log rather than tracked separately, see [`DerivedStats`].
//!
//! # Example
//!
//! ```rust
//! use cryptoscope::deobfuscation::{EventKind, EventLog};
//! use cryptoscope::metadata::token::Token;
//!
//! let mut log = EventLog::new();
//! log.record(EventKind::StringDecrypted)
//!     .at(Token::new(0x06000001), 4)
//!     .message("decrypted: \"hello world\"");
//! log.info("Starting pass: proxy-resolution");
//!
//! assert_eq!(log.count_kind(EventKind::StringDecrypted), 1);
//! println!("{}", log.summary());
//! ```

use std::{collections::HashMap, fmt, time::Duration};

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::metadata::token::Token;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum EventKind {
    /// A proxy type's target was decoded and resolved.
    #[strum(to_string = "proxies resolved")]
    ProxyResolved,
    /// A proxy type was deleted from the module.
    #[strum(to_string = "proxy types removed")]
    ProxyTypeRemoved,
    /// A call through a proxy was replaced by a direct call.
    #[strum(to_string = "call sites rewritten")]
    CallSiteRewritten,
    /// A string was decrypted and inlined.
    #[strum(to_string = "strings decrypted")]
    StringDecrypted,
    /// A numeric constant was decrypted and inlined.
    #[strum(to_string = "constants decrypted")]
    ConstantDecrypted,
    /// A decrypt call site could not be decrypted and was left as is.
    #[strum(to_string = "sites failed")]
    SiteFailed,
    /// A type looked like a candidate but did not meet all preconditions.
    #[strum(to_string = "candidates skipped")]
    CandidateSkipped,
    /// Informational message.
    #[strum(to_string = "info")]
    Info,
    /// Warning message.
    #[strum(to_string = "warnings")]
    Warning,
    /// Error message.
    #[strum(to_string = "errors")]
    Error,
}

impl EventKind {
    /// Returns true if this event kind represents a transformation of the module.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ProxyResolved
                | Self::ProxyTypeRemoved
                | Self::CallSiteRewritten
                | Self::StringDecrypted
                | Self::ConstantDecrypted
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

/// A single logged event.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The method or type the event refers to (if applicable).
    pub token: Option<Token>,
    /// Instruction index within the method (if applicable).
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<&'static str>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            token: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.token, self.location) {
            (Some(token), Some(location)) => {
                write!(f, "[{}] {} @ {}+{}", self.kind, self.message, token, location)
            }
            (Some(token), None) => write!(f, "[{}] {} @ {}", self.kind, self.message, token),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is
/// dropped.
pub struct EventBuilder<'a> {
    log: &'a mut EventLog,
    event: Event,
}

impl EventBuilder<'_> {
    /// Sets the method and instruction index where the event occurred.
    pub fn at(mut self, method: Token, location: usize) -> Self {
        self.event.token = Some(method);
        self.event.location = Some(location);
        self
    }

    /// Sets only the token (for type- or method-level events).
    pub fn token(mut self, token: Token) -> Self {
        self.event.token = Some(token);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.event.message = msg.into();
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: &'static str) -> Self {
        self.event.pass = Some(pass_name);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let event = std::mem::replace(&mut self.event, Event::new(EventKind::Info, ""));
        self.log.events.push(event);
    }
}

/// Collection of events from a deobfuscation run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The message defaults to the kind's description.
    pub fn record(&mut self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Event::new(kind, kind.to_string()),
        }
    }

    /// Records an informational message.
    pub fn info(&mut self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&mut self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends all events of another log.
    pub fn merge(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for event in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind.is_transformation())
            .count()
    }

    /// Generates a human-readable summary of all transformation events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();
        let parts: Vec<String> = EventKind::iter()
            .filter(EventKind::is_transformation)
            .filter_map(|kind| counts.get(&kind).map(|count| format!("{count} {kind}")))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }
        parts.join(", ")
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Statistics derived from an [`EventLog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivedStats {
    /// Number of proxy types whose target was resolved.
    pub proxies_resolved: usize,
    /// Number of proxy types deleted.
    pub proxy_types_removed: usize,
    /// Number of proxy call sites rewritten to direct calls.
    pub call_sites_rewritten: usize,
    /// Number of strings decrypted.
    pub strings_decrypted: usize,
    /// Number of numeric constants decrypted.
    pub constants_decrypted: usize,
    /// Number of decrypt call sites left untouched.
    pub sites_failed: usize,
    /// Number of candidate types skipped.
    pub candidates_skipped: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            proxies_resolved: get(EventKind::ProxyResolved),
            proxy_types_removed: get(EventKind::ProxyTypeRemoved),
            call_sites_rewritten: get(EventKind::CallSiteRewritten),
            strings_decrypted: get(EventKind::StringDecrypted),
            constants_decrypted: get(EventKind::ConstantDecrypted),
            sites_failed: get(EventKind::SiteFailed),
            candidates_skipped: get(EventKind::CandidateSkipped),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
            total_time: Duration::ZERO,
        }
    }

    /// Sets the processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Returns true if the run changed the module.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.proxies_resolved
            + self.proxy_types_removed
            + self.call_sites_rewritten
            + self.strings_decrypted
            + self.constants_decrypted
            > 0
    }

    /// One-line summary of the non-zero counters.
    #[must_use]
    pub fn summary(&self) -> String {
        let counters = [
            (self.proxies_resolved, EventKind::ProxyResolved),
            (self.proxy_types_removed, EventKind::ProxyTypeRemoved),
            (self.call_sites_rewritten, EventKind::CallSiteRewritten),
            (self.strings_decrypted, EventKind::StringDecrypted),
            (self.constants_decrypted, EventKind::ConstantDecrypted),
            (self.sites_failed, EventKind::SiteFailed),
        ];
        let parts: Vec<String> = counters
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, kind)| format!("{count} {kind}"))
            .collect();

        let body = if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        };
        format!("{body} in {:.2?}", self.total_time)
    }
}
