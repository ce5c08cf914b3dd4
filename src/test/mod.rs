//! Shared fixtures for unit tests: module builders and an in-process execution host.

mod host;

pub use builders::*;
pub use host::MockHost;
