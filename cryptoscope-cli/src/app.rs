use std::path::PathBuf;

use clap::Parser;

/// cryptoscope - removes delegate proxies and constant encryption from .NET assemblies
#[derive(Debug, Parser)]
#[command(name = "cryptoscope", version, about, long_about = None)]
pub struct Cli {
    /// Path to the .NET assembly file.
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Output file or directory (default: next to the input, with the suffix appended).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Suffix appended to the file stem of the output.
    #[arg(long, default_value = "-deobf")]
    pub suffix: String,

    /// Host bridge executable used to load, run and write modules
    /// (default: cryptoscope-host next to this binary or on PATH).
    #[arg(long, value_name = "PATH", env = "CRYPTOSCOPE_HOST")]
    pub host: Option<PathBuf>,

    /// Additional module proxy targets may resolve into (repeatable).
    #[arg(short, long = "reference", value_name = "FILE")]
    pub references: Vec<PathBuf>,

    /// Do not resolve delegate proxies.
    #[arg(long)]
    pub no_proxies: bool,

    /// Do not decrypt strings and constants.
    #[arg(long)]
    pub no_decryption: bool,

    /// Rewrite proxied call sites but keep the proxy types.
    #[arg(long)]
    pub keep_proxy_types: bool,

    /// Answer float and double sites with the int64 decrypt method.
    #[arg(long)]
    pub int64_compat: bool,

    /// Write a JSON report to this file.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Emit the report as JSON on stdout instead of human-readable text.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Wait for Enter before exiting.
    #[arg(long)]
    pub pause: bool,
}
