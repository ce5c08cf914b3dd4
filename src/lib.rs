// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # cryptoscope
//!
//! A deobfuscator for .NET modules protected with delegate-proxy call indirection and
//! resource-backed string and constant encryption.
//!
//! ## Features
//!
//! - **Proxy resolution** - Decodes the target token hidden in generated delegate types,
//!   resolves it and rewrites every proxied call into a direct `call`, `callvirt` or `newobj`
//! - **Constant decryption** - Runs the module's own decrypt methods in an execution host and
//!   inlines the returned strings and numbers as literal loads
//! - **Slot-preserving rewrites** - Method bodies are edited in place, never resized, so
//!   branch targets and exception regions stay valid
//! - **Event log** - Every rewrite, skip and failure is recorded and summarized
//!
//! ## Architecture
//!
//! - [`file`] - Memory-mapped input and PE/CLR header validation
//! - [`metadata`] - The mutable module graph, tokens, signatures and reference resolution
//! - [`assembly`] - Opcodes and instructions of method bodies
//! - [`emulation`] - The execution host traits used as decryption oracle
//! - [`bridge`] - A process-backed module codec and execution host
//! - [`deobfuscation`] - The passes, the engine running them and the rewrite primitives
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cryptoscope::{
//!     bridge::HostBridge,
//!     deobfuscation::{DeobfuscationEngine, EngineConfig},
//!     file::File,
//! };
//! use std::path::Path;
//!
//! let bridge = HostBridge::new("cryptoscope-host");
//! let engine = DeobfuscationEngine::new(EngineConfig::default()).with_host(&bridge);
//!
//! let file = File::from_file(Path::new("obfuscated.exe"))?;
//! let (output, result) = engine.process_file(&bridge, &file)?;
//! std::fs::write("obfuscated-deobf.exe", output)?;
//! println!("{}", result.summary());
//! # Ok::<(), cryptoscope::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

pub(crate) mod utils;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Input loading and validation of managed PE images.
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::file::File;
///
/// let file = File::from_mem(std::fs::read("app.exe")?)?;
/// println!("CLR header: {:?}", file.clr());
/// # Ok::<(), cryptoscope::Error>(())
/// ```
pub mod file;

/// Opcodes and instructions of CIL method bodies.
///
/// - [`assembly::OpCode`] - ECMA-335 opcode with mnemonic table
/// - [`assembly::Instruction`] - An opcode with its decoded operand
/// - [`assembly::StackBehavior`] - Pops and pushes of an instruction
pub mod assembly;

/// The module graph rewritten by the passes.
///
/// - [`metadata::Module`] - Types, methods, member references
/// - [`metadata::token::Token`] - Stable metadata identifiers
/// - [`metadata::resolver`] - Resolution of member references to method definitions
/// - [`metadata::codec::ModuleCodec`] - Conversion between bytes and the graph
pub mod metadata;

/// Dynamic execution of the target's own code, used as decryption oracle.
pub mod emulation;

/// Process-backed implementation of the module codec and execution host.
pub mod bridge;

/// Proxy resolution, constant decryption and the engine running them.
pub mod deobfuscation;

/// `cryptoscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::{file::File, Result};
///
/// fn load(path: &str) -> Result<File> {
///     File::from_file(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `cryptoscope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::{file::File, Error};
///
/// match File::from_file(std::path::Path::new("notes.txt")) {
///     Ok(_) => println!("Loaded successfully"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

pub use bridge::HostBridge;
pub use deobfuscation::{DeobfuscationEngine, DeobfuscationResult, EngineConfig};
pub use metadata::Module;
