//! Built-in deobfuscation passes.
//!
//! Each pass implements [`ModulePass`](crate::deobfuscation::ModulePass), operates on the
//! whole module graph and records what it did into an
//! [`EventLog`](crate::deobfuscation::EventLog).
//!
//! The [`DeobfuscationEngine`](crate::deobfuscation::DeobfuscationEngine) runs them in this
//! order:
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`ProxyResolutionPass`] | Replaces calls through delegate proxies with direct calls, removes the proxies |
//! | [`ConstantDecryptionPass`] | Replaces decrypt calls with the literals a live oracle returns |
//!
//! Both passes edit method bodies exclusively through
//! [`crate::deobfuscation::rewrite`], so instruction counts never change.

mod constants;
mod proxy;

pub use self::constants::{ConstantDecryptionPass, DecryptKind, DecryptMethod, DecryptionHelper};
pub use self::proxy::{call_kind, ProxyResolutionPass, ProxyType};
