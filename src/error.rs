use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! bridge_error {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::Bridge(format!($fmt $(, $arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most failures inside the rewriting passes never surface as an [`Error`]: a candidate type
/// that does not match a pattern, a reference that cannot be resolved, or a single call site
/// whose oracle query fails are all handled locally and recorded as events. The variants here
/// describe the failures that *do* propagate, either to a pass (which then skips the affected
/// item) or to the top level (which aborts the run).
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Corrupted or non-CLR input file
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input boundaries
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
///
/// ## Collaborator Errors
/// - [`Error::Bridge`] - Host bridge protocol or process failure
/// - [`Error::Json`] - Malformed JSON exchanged with the host bridge
/// - [`Error::Base64`] - Malformed base64 payload from the host bridge
///
/// ## Oracle Errors
/// - [`Error::OracleUnavailable`] - The original image could not be loaded for execution
/// - [`Error::Invocation`] - A decrypt method threw or could not be invoked
/// - [`Error::UnexpectedValue`] - The oracle returned a value of the wrong kind
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::{Error, file::File};
/// use std::path::Path;
///
/// match File::from_file(Path::new("obfuscated.exe")) {
///     Ok(file) => println!("Loaded {} bytes", file.len()),
///     Err(Error::Empty) => eprintln!("Input is empty"),
///     Err(Error::Malformed { message, .. }) => eprintln!("Not a CLR image: {}", message),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged or is not a managed PE image.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading the input.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// The host bridge process failed, answered out of protocol, or reported an error.
    #[error("Host bridge - {0}")]
    Bridge(String),

    /// A message exchanged with the host bridge was not valid JSON for the expected shape.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// A binary payload returned by the host bridge was not valid base64.
    #[error("{0}")]
    Base64(#[from] base64::DecodeError),

    /// The execution host could not load the original image.
    ///
    /// When this is returned from [`crate::emulation::ExecutionHost::load_executable`] the
    /// whole constant decryption pass is skipped; proxy resolution results are unaffected.
    #[error("Oracle unavailable - {0}")]
    OracleUnavailable(String),

    /// Invoking a live decrypt method failed.
    #[error("Invocation of {method} failed - {message}")]
    Invocation {
        /// Name of the invoked runtime method
        method: String,
        /// Reason reported by the execution host
        message: String,
    },

    /// The oracle produced a value whose kind does not match the decrypt method's return type.
    #[error("Expected a {expected} value, got {found}")]
    UnexpectedValue {
        /// The value kind the call site requires
        expected: &'static str,
        /// The value kind the oracle produced
        found: &'static str,
    },

    /// A token did not refer to an entity of the module.
    #[error("No entity with token {0} in module")]
    TokenNotFound(Token),
}
