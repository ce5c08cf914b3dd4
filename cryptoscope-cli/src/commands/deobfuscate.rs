use std::path::Path;

use anyhow::Context;
use cryptoscope::{
    bridge::{HostBridge, HOST_NAME},
    deobfuscation::{
        DeobfuscationEngine, DeobfuscationResult, EngineConfig, EventKind, NumericOracle,
    },
    metadata::resolver::ModuleResolver,
};

use crate::{
    app::Cli,
    commands::common::{file_display_name, load_file, load_reference, resolve_output_path},
    output::Report,
};

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = build_config(cli);
    let file = load_file(&cli.path)?;

    let host = match &cli.host {
        Some(host) => host.clone(),
        None => HostBridge::locate().with_context(|| {
            format!("no {HOST_NAME} found next to the executable or on PATH, pass --host")
        })?,
    };
    let bridge = HostBridge::new(host);
    let mut resolver = ModuleResolver::new();
    for reference in &cli.references {
        resolver.add_reference(load_reference(&bridge, reference)?);
    }
    log::debug!("{} reference modules loaded", resolver.reference_count());

    let engine = DeobfuscationEngine::new(config)
        .with_resolver(&resolver)
        .with_host(&bridge);
    let (output, result) = engine
        .process_file(&bridge, &file)
        .with_context(|| format!("deobfuscation failed: {}", cli.path.display()))?;

    let output_path = resolve_output_path(&cli.path, cli.output.as_deref(), &cli.suffix);
    std::fs::write(&output_path, output)
        .with_context(|| format!("failed to write output: {}", output_path.display()))?;

    let report = build_report(&cli.path, &output_path, engine.config(), &result);

    if let Some(report_file) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(report_file, json)
            .with_context(|| format!("failed to write report: {}", report_file.display()))?;
        eprintln!("Report written to {}", report_file.display());
    }

    report.emit(cli.json)
}

fn build_config(cli: &Cli) -> EngineConfig {
    EngineConfig {
        enable_proxy_resolution: !cli.no_proxies,
        enable_constant_decryption: !cli.no_decryption,
        remove_proxy_types: !cli.keep_proxy_types,
        numeric_oracle: if cli.int64_compat {
            NumericOracle::Int64Compat
        } else {
            NumericOracle::TypeMatched
        },
    }
}

fn build_report(
    input: &Path,
    output: &Path,
    config: &EngineConfig,
    result: &DeobfuscationResult,
) -> Report {
    let messages = |kind: EventKind| -> Vec<String> {
        result
            .events
            .filter_kind(kind)
            .map(|ev| ev.message.clone())
            .collect()
    };

    Report {
        file: file_display_name(input),
        output: file_display_name(output),
        config: config.clone(),
        time_ms: result.total_time.as_millis(),
        stats: result.stats(),
        warnings: messages(EventKind::Warning),
        errors: messages(EventKind::Error),
    }
}
