//! Input file abstraction and managed PE validation.
//!
//! Before a module is handed to the [`crate::metadata::ModuleCodec`], the raw bytes are
//! loaded through this module and checked to be a PE image carrying a CLR runtime header.
//! The same bytes later feed the execution host as the untouched *original* image, so a
//! [`File`] is never modified after it has been loaded.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - Validated input image with access to its raw bytes
//! - [`crate::file::Backend`] - Trait for different data sources (disk files, memory buffers)
//!
//! # Data Sources
//!
//! - **Physical files** - Memory-mapped files for efficient disk access
//! - **Memory buffers** - In-memory data, e.g. bytes received from another tool
//!
//! # Examples
//!
//! ```rust,no_run
//! use cryptoscope::file::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("obfuscated.exe"))?;
//! let (clr_rva, clr_size) = file.clr();
//! println!("CLR header at RVA 0x{:x}, size: {} bytes", clr_rva, clr_size);
//! # Ok::<(), cryptoscope::Error>(())
//! ```

mod memory;
mod physical;

use std::path::Path;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};
use goblin::pe::PE;
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of PE data, allowing for both in-memory and on-disk
/// representations.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

/// A loaded, validated managed PE image.
///
/// Construction fails unless the data parses as a PE file with an optional header whose
/// data directories contain a CLR runtime header. Only the location of that header is kept;
/// the parsed PE itself is discarded, since all structural work happens in the module model.
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// RVA and size of the CLR runtime header directory.
    clr: (usize, usize),
    /// Whether the optional header is PE32+.
    pe32_plus: bool,
}

impl File {
    /// Loads and validates a PE file from the given path.
    ///
    /// The file is memory-mapped for efficient access.
    ///
    /// # Arguments
    ///
    /// * `file` - Path to the PE file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or opened
    /// - The file is not a valid PE format
    /// - The PE file does not contain .NET metadata (missing CLR runtime header)
    /// - The file is empty
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;
        Self::load(input)
    }

    /// Loads and validates a PE file from a memory buffer.
    ///
    /// # Errors
    ///
    /// Same as [`File::from_file`], minus the I/O failures.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);
        Self::load(input)
    }

    /// Shared validation for all backends.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty, not a valid PE, or missing .NET metadata.
    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let (clr, pe32_plus) = match PE::parse(data.data()) {
            Ok(pe) => match pe.header.optional_header {
                Some(optional_header) => {
                    match optional_header.data_directories.get_clr_runtime_header() {
                        Some(clr_dir) => (
                            (clr_dir.virtual_address as usize, clr_dir.size as usize),
                            pe.is_64,
                        ),
                        None => {
                            return Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        }
                    }
                }
                None => return Err(malformed_error!("File does not have an OptionalHeader")),
            },
            Err(error) => return Err(GoblinErr(error)),
        };

        Ok(File {
            data: Box::new(data),
            clr,
            pe32_plus,
        })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the RVA and size of the CLR runtime header.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        self.clr
    }

    /// Returns true for PE32+ (64-bit) images.
    #[must_use]
    pub fn is_pe32_plus(&self) -> bool {
        self.pe32_plus
    }

    /// Returns the raw, unmodified image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a bounds-checked slice of the raw image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}
