//! The module graph: decoded types, methods, member references and their signatures.
//!
//! # Key Components
//!
//! - [`Module`] - The mutable graph of one managed binary
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`signatures`] - Decoded type and method signatures
//! - [`resolver`] - `MemberRef` to definition resolution
//! - [`codec`] - The byte-level load/write seam
//! - [`userstring`] - String literals that may not be valid UTF-16
//!
//! # Examples
//!
//! ```rust,no_run
//! use cryptoscope::metadata::{codec::ModuleCodec, Module};
//!
//! fn count_methods(codec: &dyn ModuleCodec, data: &[u8]) -> cryptoscope::Result<usize> {
//!     let module: Module = codec.load(data)?;
//!     Ok(module.methods().count())
//! }
//! ```

/// The byte-level load/write seam
pub mod codec;
/// Types, methods and member references of a module
pub mod module;
/// `MemberRef` resolution
pub mod resolver;
/// Implementation of method and type signatures
pub mod signatures;
/// Commonly used metadata token type
pub mod token;
/// UTF-16 string literals
pub mod userstring;

pub use module::{MemberRef, MemberRefSignature, MethodDef, MethodModifiers, Module, TypeDef};
pub use userstring::UserString;
