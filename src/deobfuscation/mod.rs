//! Deobfuscation of delegate proxies and encrypted constants.
//!
//! This module reverses two protections applied to managed modules: method calls routed
//! through generated delegate types, and literals replaced by calls to runtime decrypt
//! methods.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                      Deobfuscation Pipeline                       │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  Input: Module graph (via ModuleCodec) + original bytes           │
//! │           │                                                       │
//! │           ▼                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                  Proxy Resolution                           │  │
//! │  │  delegate .cctor signature → MemberRef → MethodResolver     │  │
//! │  │  call P  ⇒  call / callvirt / newobj <target>               │  │
//! │  └──────────────────────────┬──────────────────────────────────┘  │
//! │                             ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                  Constant Decryption                        │  │
//! │  │  helper .cctor signature → decrypt methods by signature     │  │
//! │  │  ldc.i4 n; call M  ⇒  nop; ldstr / ldc.* <oracle(n)>        │  │
//! │  └──────────────────────────┬──────────────────────────────────┘  │
//! │                             ▼                                     │
//! │  Output: rewritten Module + DeobfuscationResult (events, stats)   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - [`DeobfuscationEngine`] - runs the passes over one module
//! - [`EngineConfig`] - which passes run and how
//! - [`ModulePass`] - the trait both passes implement
//! - [`rewrite`] - the in-place instruction rewrite primitives
//! - [`EventLog`] / [`DerivedStats`] - what happened, and the counts derived from it
//!
//! # Example
//!
//! ```rust,no_run
//! use cryptoscope::deobfuscation::{DeobfuscationEngine, EngineConfig};
//! use cryptoscope::metadata::Module;
//!
//! fn run(module: &mut Module, original: &[u8]) -> cryptoscope::Result<()> {
//!     let engine = DeobfuscationEngine::new(EngineConfig::proxies_only());
//!     let result = engine.process(module, original)?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

mod changes;
mod config;
mod engine;
mod pass;
mod result;

pub mod passes;
pub mod rewrite;

pub use changes::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use config::{EngineConfig, NumericOracle};
pub use engine::DeobfuscationEngine;
pub use pass::ModulePass;
pub use result::DeobfuscationResult;
