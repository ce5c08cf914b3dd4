//! Rendering of the deobfuscation report.
//!
//! The human-readable form goes to stderr next to the log output; `--json` prints the report
//! on stdout so it can be piped.

use std::fmt::Write as _;

use comfy_table::{presets, CellAlignment, ContentArrangement, Table};
use cryptoscope::deobfuscation::{DerivedStats, EngineConfig};
use serde::Serialize;

const INDENT: &str = "  ";

/// What one run did to one assembly.
#[derive(Debug, Serialize)]
pub struct Report {
    pub file: String,
    pub output: String,
    pub config: EngineConfig,
    pub time_ms: u128,
    pub stats: DerivedStats,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Report {
    /// Writes the report to stdout as JSON, or to stderr as text.
    pub fn emit(&self, json: bool) -> anyhow::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(self)?);
        } else {
            eprint!("{}", self.render());
        }
        Ok(())
    }

    /// The text form of the report.
    pub fn render(&self) -> String {
        let mut out = format!("Deobfuscation complete: {} -> {}\n", self.file, self.output);

        for line in counters(&self.stats).to_string().lines() {
            let _ = writeln!(out, "{INDENT}{}", line.trim_end());
        }

        #[allow(clippy::cast_precision_loss)]
        let time_secs = self.time_ms as f64 / 1000.0;
        let _ = writeln!(out, "{INDENT}Time: {time_secs:.1}s");

        for (title, messages) in [("Warnings", &self.warnings), ("Errors", &self.errors)] {
            if messages.is_empty() {
                continue;
            }
            let _ = writeln!(out, "{INDENT}{title}: {}", messages.len());
            for message in messages {
                let _ = writeln!(out, "{INDENT}{INDENT}- {message}");
            }
        }
        out
    }
}

/// Borderless two-column table of the counters, labels left and counts right aligned.
fn counters(stats: &DerivedStats) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Disabled);

    for (label, count) in [
        ("Proxies resolved", stats.proxies_resolved),
        ("Proxy types removed", stats.proxy_types_removed),
        ("Call sites rewritten", stats.call_sites_rewritten),
        ("Strings decrypted", stats.strings_decrypted),
        ("Constants decrypted", stats.constants_decrypted),
        ("Sites failed", stats.sites_failed),
        ("Candidates skipped", stats.candidates_skipped),
    ] {
        table.add_row(vec![label.to_string(), count.to_string()]);
    }

    if let Some(labels) = table.column_mut(0) {
        labels.set_padding((0, 1));
    }
    if let Some(counts) = table.column_mut(1) {
        counts.set_cell_alignment(CellAlignment::Right);
        counts.set_padding((1, 0));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> Report {
        Report {
            file: "app.exe".into(),
            output: "app-deobf.exe".into(),
            config: EngineConfig::default(),
            time_ms: 1500,
            stats: DerivedStats {
                proxies_resolved: 3,
                call_sites_rewritten: 12,
                strings_decrypted: 140,
                ..DerivedStats::default()
            },
            warnings: vec![],
            errors: vec!["invoke of Obf.Helper::M failed".into()],
        }
    }

    #[test]
    fn text_lists_counters_and_errors() {
        let text = report().render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Deobfuscation complete: app.exe -> app-deobf.exe");
        assert!(lines[1].starts_with("  Proxies resolved"));
        assert!(lines[1].ends_with(" 3"));
        assert!(lines.iter().any(|l| l.starts_with("  Strings decrypted") && l.ends_with("140")));
        assert!(lines.contains(&"  Time: 1.5s"));
        assert!(!text.contains("Warnings"));
        assert!(lines.contains(&"  Errors: 1"));
        assert_eq!(lines.last(), Some(&"    - invoke of Obf.Helper::M failed"));
    }

    #[test]
    fn counts_are_right_aligned() {
        let text = counters(&report().stats).to_string();
        let rows: Vec<&str> = text.lines().map(str::trim_end).collect();
        assert_eq!(rows.len(), 7);
        let width = rows[0].len();
        assert!(rows.iter().all(|r| r.len() == width));
    }

    #[test]
    fn json_form_keeps_field_names() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["stats"]["strings_decrypted"], 140);
        assert_eq!(json["config"]["remove_proxy_types"], true);
        assert_eq!(json["time_ms"], 1500);
    }
}
