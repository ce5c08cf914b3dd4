use std::path::{Path, PathBuf};

use anyhow::Context;
use cryptoscope::{file::File, metadata::codec::ModuleCodec, Module};

/// Load and validate a .NET assembly from disk.
pub fn load_file(path: &Path) -> anyhow::Result<File> {
    File::from_file(path).with_context(|| format!("failed to load assembly: {}", path.display()))
}

/// Load a reference module through the codec.
pub fn load_reference(codec: &dyn ModuleCodec, path: &Path) -> anyhow::Result<Module> {
    let file = load_file(path)?;
    codec
        .load(file.data())
        .with_context(|| format!("failed to load reference: {}", path.display()))
}

/// Where the rewritten module goes.
///
/// Without `output` the file is placed next to the input; a directory `output` receives the
/// suffixed file name; any other `output` is used as is.
pub fn resolve_output_path(input: &Path, output: Option<&Path>, suffix: &str) -> PathBuf {
    if let Some(out) = output {
        if out.is_dir() {
            return out.join(suffixed_filename(input, suffix));
        }
        return out.to_path_buf();
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(suffixed_filename(input, suffix))
}

/// `app.exe` with suffix `-deobf` becomes `app-deobf.exe`.
pub fn suffixed_filename(input: &Path, suffix: &str) -> String {
    let stem = input
        .file_stem()
        .map_or("output", |s| s.to_str().unwrap_or("output"));
    let ext = input.extension().map_or("", |e| e.to_str().unwrap_or(""));

    if ext.is_empty() {
        format!("{stem}{suffix}")
    } else {
        format!("{stem}{suffix}.{ext}")
    }
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
