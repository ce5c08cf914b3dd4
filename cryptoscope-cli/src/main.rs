mod app;
mod commands;
mod output;

use std::io::BufRead;

use clap::Parser;

use crate::app::Cli;

fn main() {
    if let Err(err) = ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    }) {
        eprintln!("failed to set Ctrl+C handler: {err}");
    }

    let cli = Cli::parse();

    // Show cryptoscope info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("cryptoscope", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let outcome = commands::deobfuscate::run(&cli);
    if let Err(err) = &outcome {
        eprintln!("cryptoscope failed: {err:#}");
    }

    if cli.pause {
        eprintln!("Press Enter to exit...");
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
    }

    if outcome.is_err() {
        std::process::exit(1);
    }
}
