// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::env;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use num_traits::ToPrimitive;

use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};
use crate::core::expr::parse_number;
use crate::core::macro_processor::DEFAULT_MAX_DEPTH;
use crate::core::text_utils::is_ident;

use super::DEFAULT_MACRO;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Macro assembler for 256-bit stack machine bytecode.

Compiles the macro named by -m/--macro (MAIN by default) from INPUT, expanding
nested macros and templates, resolving jump labels and appending jump and code
tables after the program.
Without -o/--outfile or -b/--bin the bytecode is printed to stdout as hex.
Environment defaults (STACKFORGE_*) apply whenever the matching flag is absent.";

#[derive(Parser, Debug)]
#[command(
    name = "stackforge",
    version = VERSION,
    about = "Macro assembler for stack machine bytecode with templates, jump labels and tables",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        value_name = "INPUT",
        long_help = "Root source file. Its leading #include block is resolved before parsing."
    )]
    pub input: PathBuf,
    #[arg(
        short = 'm',
        long = "macro",
        value_name = "NAME",
        long_help = "Macro to compile. Defaults to STACKFORGE_MACRO, then MAIN."
    )]
    pub macro_name: Option<String>,
    #[arg(
        short = 'I',
        long = "include-path",
        value_name = "DIR",
        action = ArgAction::Append,
        long_help = "Additional include search root (repeatable). Include resolution order is: including file directory, then include roots in command-line order."
    )]
    pub include_paths: Vec<PathBuf>,
    #[arg(
        long = "max-depth",
        value_name = "N",
        long_help = "Maximum macro nesting depth. Also bounds #include nesting. Defaults to 256."
    )]
    pub max_depth: Option<usize>,
    #[arg(
        long = "offset",
        value_name = "N",
        long_help = "Absolute offset of the first emitted byte (decimal or 0x hex). Jump labels and table offsets include it."
    )]
    pub offset: Option<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Write the bytecode as lower-case hex to FILE."
    )]
    pub outfile: Option<PathBuf>,
    #[arg(
        short = 'b',
        long = "bin",
        value_name = "FILE",
        long_help = "Write the raw bytecode to FILE."
    )]
    pub bin_file: Option<PathBuf>,
    #[arg(
        short = 's',
        long = "sourcemap",
        value_name = "FILE",
        long_help = "Write a JSON source map (one entry per emitted byte) to FILE."
    )]
    pub sourcemap_file: Option<PathBuf>,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select diagnostic output format. text is default; json prints one object per diagnostic."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostic output for successful runs. Errors are still reported unless --no-error is set."
    )]
    pub quiet: bool,
    #[arg(
        short = 'E',
        long = "error",
        value_name = "FILE",
        long_help = "Write diagnostics to FILE instead of stderr."
    )]
    pub error_file: Option<PathBuf>,
    #[arg(
        long = "error-append",
        action = ArgAction::SetTrue,
        requires = "error_file",
        long_help = "Append diagnostics to --error FILE instead of truncating it."
    )]
    pub error_append: bool,
    #[arg(
        long = "no-error",
        action = ArgAction::SetTrue,
        conflicts_with_all = ["error_file", "error_append"],
        long_help = "Disable all diagnostic output routing."
    )]
    pub no_error: bool,
    #[arg(
        short = 'w',
        long = "no-warn",
        action = ArgAction::SetTrue,
        conflicts_with = "warn_error",
        long_help = "Suppress warning diagnostics."
    )]
    pub no_warn: bool,
    #[arg(
        long = "Werror",
        action = ArgAction::SetTrue,
        long_help = "Treat warnings as errors (non-zero exit status)."
    )]
    pub warn_error: bool,
}

#[derive(Debug, Clone)]
pub enum DiagnosticsSinkConfig {
    Stderr,
    File { path: PathBuf, append: bool },
    Disabled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WarningPolicy {
    pub emit_warnings: bool,
    pub treat_warnings_as_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Where the compiled program goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTargets {
    pub hex_file: Option<PathBuf>,
    pub bin_file: Option<PathBuf>,
    pub sourcemap_file: Option<PathBuf>,
    /// Neither -o nor -b was given.
    pub hex_to_stdout: bool,
}

fn cli_error(message: impl Into<String>) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(AsmErrorKind::Cli, &message.into(), None),
        Vec::new(),
    )
}

fn parse_env_bool(var_name: &str) -> Result<Option<bool>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_ascii_lowercase();
    let parsed = match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        "" => None,
        _ => {
            return Err(cli_error(format!(
                "Invalid boolean value for {var_name}: {value}"
            )))
        }
    };
    Ok(parsed)
}

fn parse_env_path(var_name: &str) -> Result<Option<PathBuf>, AsmRunError> {
    Ok(parse_env_string(var_name)?.map(PathBuf::from))
}

fn parse_env_path_list(var_name: &str) -> Vec<PathBuf> {
    let Some(raw) = env::var_os(var_name) else {
        return Vec::new();
    };
    env::split_paths(&raw)
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}

fn parse_env_usize(var_name: &str) -> Result<Option<usize>, AsmRunError> {
    let Some(value) = parse_env_string(var_name)? else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| cli_error(format!("Invalid integer value for {var_name}: {value}")))
}

fn parse_env_string(var_name: &str) -> Result<Option<String>, AsmRunError> {
    let Some(raw) = env::var_os(var_name) else {
        return Ok(None);
    };
    let value = raw.to_string_lossy().trim().to_string();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(value))
}

fn parse_offset(text: &str) -> Result<usize, AsmRunError> {
    parse_number(text.trim())
        .and_then(|value| value.to_usize())
        .ok_or_else(|| cli_error(format!("Invalid --offset value: {text}")))
}

/// Validate CLI arguments and return parsed configuration.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    let env_macro = parse_env_string("STACKFORGE_MACRO")?;
    let env_include_paths = parse_env_path_list("STACKFORGE_INCLUDE_PATHS");
    let env_max_depth = parse_env_usize("STACKFORGE_MAX_DEPTH")?;
    let env_quiet = parse_env_bool("STACKFORGE_QUIET")?;
    let env_no_warn = parse_env_bool("STACKFORGE_NO_WARN")?;
    let env_warn_error = parse_env_bool("STACKFORGE_WERROR")?;
    let env_error_file = parse_env_path("STACKFORGE_ERROR_FILE")?;

    let macro_name = cli
        .macro_name
        .clone()
        .or(env_macro)
        .unwrap_or_else(|| DEFAULT_MACRO.to_string());
    if !is_ident(&macro_name) {
        return Err(cli_error(format!("Invalid macro name: {macro_name}")));
    }

    let mut effective_include_paths = env_include_paths;
    effective_include_paths.extend(cli.include_paths.clone());

    let effective_max_depth = cli
        .max_depth
        .or(env_max_depth)
        .unwrap_or(DEFAULT_MAX_DEPTH);
    if effective_max_depth == 0 {
        return Err(cli_error("--max-depth must be at least 1"));
    }

    let starting_offset = match cli.offset.as_deref() {
        Some(text) => parse_offset(text)?,
        None => 0,
    };

    let effective_quiet = cli.quiet || env_quiet.unwrap_or(false);
    let effective_no_warn = if cli.no_warn {
        true
    } else if cli.warn_error {
        false
    } else {
        env_no_warn.unwrap_or(false)
    };
    let effective_warn_error = if cli.warn_error {
        true
    } else if effective_no_warn {
        false
    } else {
        env_warn_error.unwrap_or(false)
    };
    let effective_error_file = if cli.error_file.is_some() {
        cli.error_file.clone()
    } else {
        env_error_file
    };

    let diagnostics_sink = if cli.no_error {
        DiagnosticsSinkConfig::Disabled
    } else if let Some(path) = effective_error_file {
        DiagnosticsSinkConfig::File {
            path,
            append: cli.error_append,
        }
    } else {
        DiagnosticsSinkConfig::Stderr
    };

    Ok(CliConfig {
        input_path: cli.input.clone(),
        macro_name,
        include_paths: effective_include_paths,
        max_depth: effective_max_depth,
        starting_offset,
        outputs: OutputTargets {
            hex_file: cli.outfile.clone(),
            bin_file: cli.bin_file.clone(),
            sourcemap_file: cli.sourcemap_file.clone(),
            hex_to_stdout: cli.outfile.is_none() && cli.bin_file.is_none(),
        },
        quiet: effective_quiet,
        output_format: cli.format,
        diagnostics_sink,
        warning_policy: WarningPolicy {
            emit_warnings: !effective_no_warn,
            treat_warnings_as_errors: effective_warn_error,
        },
    })
}

/// Validated CLI configuration.
#[derive(Debug)]
pub struct CliConfig {
    pub input_path: PathBuf,
    pub macro_name: String,
    pub include_paths: Vec<PathBuf>,
    pub max_depth: usize,
    pub starting_offset: usize,
    pub outputs: OutputTargets,
    pub quiet: bool,
    pub output_format: OutputFormat,
    pub diagnostics_sink: DiagnosticsSinkConfig,
    pub warning_policy: WarningPolicy,
}

#[cfg(test)]
const ENV_VARS: [&str; 7] = [
    "STACKFORGE_MACRO",
    "STACKFORGE_INCLUDE_PATHS",
    "STACKFORGE_MAX_DEPTH",
    "STACKFORGE_QUIET",
    "STACKFORGE_NO_WARN",
    "STACKFORGE_WERROR",
    "STACKFORGE_ERROR_FILE",
];

/// Run `test` with exactly `vars` set among the STACKFORGE_* variables.
#[cfg(test)]
pub(crate) fn with_env_vars<T>(vars: &[(&str, &str)], test: impl FnOnce() -> T) -> T {
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let saved: Vec<(&str, Option<OsString>)> = ENV_VARS
        .iter()
        .map(|key| (*key, env::var_os(key)))
        .collect();

    for key in ENV_VARS {
        let value = vars.iter().find(|(name, _)| *name == key).map(|(_, v)| *v);
        match value {
            Some(value) => {
                // SAFETY: tests serialize env access via ENV_LOCK.
                unsafe { env::set_var(key, value) }
            }
            None => {
                // SAFETY: tests serialize env access via ENV_LOCK.
                unsafe { env::remove_var(key) }
            }
        }
    }

    let result = test();

    for (key, value) in saved {
        match value {
            Some(value) => {
                // SAFETY: tests serialize env access via ENV_LOCK.
                unsafe { env::set_var(key, value) }
            }
            None => {
                // SAFETY: tests serialize env access via ENV_LOCK.
                unsafe { env::remove_var(key) }
            }
        }
    }
    result
}
