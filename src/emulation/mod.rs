//! Dynamic execution of the target's own code.
//!
//! Constant decryption does not reimplement the obfuscator's ciphers. Instead the original,
//! unmodified binary is loaded into an execution host and its own decrypt methods are invoked
//! as oracles: for every encrypted literal the live method is called with the integer the
//! call site passes, and the returned value is the plaintext.
//!
//! The host is reached through four narrow traits, from image to method:
//!
//! - [`ExecutionHost`] - loads an executable image from raw bytes
//! - [`RuntimeImage`] - a loaded image, from which live types are looked up by reflection name
//! - [`RuntimeType`] - a live type, from which methods are looked up by name
//! - [`RuntimeMethod`] - a live method that can be invoked with boxed [`Value`]s
//!
//! The host never sees the module graph that is being rewritten; it holds its own copy of the
//! original bytes. [`crate::bridge::HostBridge`] is the shipped implementation.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cryptoscope::emulation::{ExecutionHost, Value};
//!
//! fn decrypt_one(host: &dyn ExecutionHost, original: &[u8]) -> cryptoscope::Result<Value> {
//!     let image = host.load_executable(original)?;
//!     let ty = image.get_type("Obf.Helper").ok_or(cryptoscope::Error::Empty)?;
//!     let method = ty.get_method("Decrypt").ok_or(cryptoscope::Error::Empty)?;
//!     method.invoke(&[Value::Int32(7)])
//! }
//! ```

mod value;

pub use value::Value;

use crate::Result;

/// Loads executable images for oracle queries.
pub trait ExecutionHost {
    /// Loads the given bytes as an executable image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OracleUnavailable`] (or a transport error) if the image cannot
    /// be loaded for execution.
    fn load_executable(&self, data: &[u8]) -> Result<Box<dyn RuntimeImage + '_>>;
}

/// An image loaded into an execution host.
pub trait RuntimeImage {
    /// Looks up a live type by reflection full name (`Namespace.Outer+Inner`).
    fn get_type(&self, full_name: &str) -> Option<Box<dyn RuntimeType + '_>>;
}

/// A live type of a loaded image.
pub trait RuntimeType {
    /// Reflection full name of this type
    fn full_name(&self) -> &str;

    /// Looks up a live method by name.
    fn get_method(&self, name: &str) -> Option<Box<dyn RuntimeMethod + '_>>;
}

/// A live method of a loaded image.
pub trait RuntimeMethod {
    /// Name of this method
    fn name(&self) -> &str;

    /// Invokes the method as a static method with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invocation`] if the method throws or cannot be called.
    fn invoke(&self, args: &[Value]) -> Result<Value>;
}
