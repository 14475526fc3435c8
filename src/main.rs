// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for stackforge.

use std::fs::OpenOptions;
use std::io::{self, Write};

use clap::Parser;
use serde_json::json;

use stackforge::assembler::cli::{validate_cli, Cli, DiagnosticsSinkConfig, OutputFormat};
use stackforge::core::assembler::error::{Diagnostic, Severity};

struct DiagnosticsSink {
    writer: Option<Box<dyn Write>>,
}

impl DiagnosticsSink {
    fn from_config(config: &DiagnosticsSinkConfig) -> io::Result<Self> {
        match config {
            DiagnosticsSinkConfig::Disabled => Ok(Self { writer: None }),
            DiagnosticsSinkConfig::Stderr => Ok(Self {
                writer: Some(Box::new(io::stderr())),
            }),
            DiagnosticsSinkConfig::File { path, append } => {
                let mut opts = OpenOptions::new();
                opts.create(true).write(true);
                if *append {
                    opts.append(true);
                } else {
                    opts.truncate(true);
                }
                let file = opts.open(path)?;
                Ok(Self {
                    writer: Some(Box::new(file)),
                })
            }
        }
    }

    fn emit_line(&mut self, line: &str) {
        if let Some(writer) = &mut self.writer {
            let _ = writeln!(writer, "{line}");
        }
    }

    fn emit_diagnostics(&mut self, diagnostics: &[Diagnostic], use_color: bool, format: OutputFormat) {
        for diag in diagnostics {
            self.emit_line(&format_diagnostic_line(diag, use_color, format));
        }
    }
}

fn severity_to_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn format_diagnostic_line(diag: &Diagnostic, use_color: bool, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        json!({
            "code": diag.code(),
            "severity": severity_to_str(diag.severity()),
            "message": diag.message(),
            "file": diag.file(),
            "line": diag.line(),
            "source": diag.source(),
            "notes": diag.notes(),
            "help": diag.help(),
        })
        .to_string()
    } else {
        diag.format_with_context(use_color)
    }
}

fn visible_diagnostics(diagnostics: &[Diagnostic], emit_warnings: bool) -> Vec<Diagnostic> {
    diagnostics
        .iter()
        .filter(|diag| emit_warnings || diag.severity() != Severity::Warning)
        .cloned()
        .collect()
}

fn main() {
    let cli = Cli::parse();
    let cli_config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    let mut sink = match DiagnosticsSink::from_config(&cli_config.diagnostics_sink) {
        Ok(sink) => sink,
        Err(err) => {
            eprintln!("Failed to open diagnostics sink: {err}");
            std::process::exit(1);
        }
    };

    let use_color = std::env::var("NO_COLOR").is_err();
    match stackforge::assembler::run_with_config(&cli_config) {
        Ok(report) => {
            if cli_config.outputs.hex_to_stdout {
                println!("{}", report.bytecode());
            }
            if cli_config.quiet {
                return;
            }
            let diagnostics = visible_diagnostics(
                report.diagnostics(),
                cli_config.warning_policy.emit_warnings,
            );
            sink.emit_diagnostics(&diagnostics, use_color, cli_config.output_format);
        }
        Err(err) => {
            let diagnostics =
                visible_diagnostics(err.diagnostics(), cli_config.warning_policy.emit_warnings);
            sink.emit_diagnostics(&diagnostics, use_color, cli_config.output_format);

            if cli_config.output_format != OutputFormat::Json
                && !matches!(cli_config.diagnostics_sink, DiagnosticsSinkConfig::Disabled)
            {
                sink.emit_line(&err.to_string());
            }
            std::process::exit(1);
        }
    }
}
