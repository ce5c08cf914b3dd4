//! Conversion between raw module bytes and the [`Module`] graph.

use crate::{metadata::module::Module, Result};

/// Decodes a managed binary into a [`Module`] and encodes it back.
///
/// Implementations must keep tokens stable: a module that is loaded and written without
/// modification addresses every entity with the same token as before.
pub trait ModuleCodec {
    /// Decodes the given binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not a managed module the codec understands.
    fn load(&self, data: &[u8]) -> Result<Module>;

    /// Encodes the module graph into a binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be serialized.
    fn write(&self, module: &Module) -> Result<Vec<u8>>;
}
