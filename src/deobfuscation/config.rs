//! Configuration for the deobfuscation engine.
//!
//! This module provides configuration types for controlling the deobfuscation
//! pipeline: which passes run, whether proxy types are kept, and how numeric
//! decrypt methods are queried.

use serde::Serialize;

/// Which live method answers numeric oracle queries for `float32` and `float64` sites.
///
/// Obfuscated binaries ship one decrypt method per numeric kind. With
/// [`NumericOracle::Int64Compat`] the `float32`/`float64` sites are queried through the
/// `int64` decrypt method; strict unboxing rejects the `int64` result and those sites are
/// left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum NumericOracle {
    /// Every site is answered by the decrypt method of its own kind.
    #[default]
    TypeMatched,
    /// `float32` and `float64` sites are answered by the `int64` decrypt method.
    Int64Compat,
}

/// Configuration for the deobfuscation engine.
///
/// # Example
///
/// ```rust
/// use cryptoscope::deobfuscation::{EngineConfig, NumericOracle};
///
/// let config = EngineConfig {
///     remove_proxy_types: false,
///     ..EngineConfig::default()
/// };
/// assert!(config.enable_proxy_resolution);
/// assert_eq!(config.numeric_oracle, NumericOracle::TypeMatched);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EngineConfig {
    /// Enable the delegate-proxy resolution pass (default: true).
    pub enable_proxy_resolution: bool,

    /// Enable the constant decryption pass (default: true).
    pub enable_constant_decryption: bool,

    /// Delete proxy types once their call sites are rewritten (default: true).
    ///
    /// Keeping them is useful to inspect the proxies in the output.
    pub remove_proxy_types: bool,

    /// Oracle selection for floating point sites (default: [`NumericOracle::TypeMatched`]).
    pub numeric_oracle: NumericOracle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_proxy_resolution: true,
            enable_constant_decryption: true,
            remove_proxy_types: true,
            numeric_oracle: NumericOracle::TypeMatched,
        }
    }
}

impl EngineConfig {
    /// Only resolves delegate proxies; no execution host is needed.
    #[must_use]
    pub fn proxies_only() -> Self {
        Self {
            enable_constant_decryption: false,
            ..Self::default()
        }
    }

    /// Only decrypts constants.
    #[must_use]
    pub fn decryption_only() -> Self {
        Self {
            enable_proxy_resolution: false,
            ..Self::default()
        }
    }

    /// Returns true if at least one pass is enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.enable_proxy_resolution || self.enable_constant_decryption
    }
}
