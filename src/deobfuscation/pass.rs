//! Pass trait for the deobfuscation pipeline.

use crate::{deobfuscation::changes::EventLog, metadata::Module, Result};

/// A rewriting pass over a whole module.
///
/// Passes receive exclusive access to the module graph and record what they did into the
/// shared event log. Collaborators a pass needs (resolver, execution host, original bytes)
/// are handed to the pass when it is constructed, so the trait itself stays free of them.
///
/// # Errors
///
/// A pass returns `Err` only for failures that should abort the whole run. Per-candidate and
/// per-site failures are recorded as events and never escalate.
pub trait ModulePass {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Runs the pass over the module.
    ///
    /// Returns `true` if the module was changed, `false` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot continue at all.
    fn run(&mut self, module: &mut Module, events: &mut EventLog) -> Result<bool>;
}
