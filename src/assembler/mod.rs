// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Compiler entry points: source loading, the core pipeline and output
//! writing for the command line driver.

pub mod cli;
mod output;
pub mod preprocess;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use crate::core::assembler::error::{AsmError, AsmRunError, Diagnostic, Severity};
use crate::core::linker::{link_tables, LinkedProgram};
use crate::core::macro_processor::{MacroProcessor, DEFAULT_MAX_DEPTH};
use crate::core::parser::parse_declarations;
use crate::core::source_map::{InputMap, SourceFile, SourceOrigin};
use crate::core::text_utils::to_hex;

use cli::{validate_cli, Cli, CliConfig};

pub use cli::VERSION;

/// Macro compiled when none is named.
pub const DEFAULT_MACRO: &str = "MAIN";

/// File name given to in-memory source.
pub const INLINE_SOURCE_NAME: &str = "<source>";

/// Knobs for [`compile_file`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub include_paths: Vec<PathBuf>,
    /// Bounds both macro nesting and `#include` nesting.
    pub max_depth: usize,
    /// Absolute offset of the first emitted byte.
    pub starting_offset: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            include_paths: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            starting_offset: 0,
        }
    }
}

/// Successful compilation result.
#[derive(Debug, Clone)]
pub struct CompileReport {
    macro_name: String,
    /// Stack items the root macro consumes and leaves behind.
    stack_signature: (usize, usize),
    starting_offset: usize,
    bytecode: String,
    bytes: Vec<u8>,
    sourcemap: Vec<SourceOrigin>,
    diagnostics: Vec<Diagnostic>,
    jump_labels: Vec<(String, usize)>,
    table_offsets: Vec<(String, usize)>,
}

impl CompileReport {
    fn new(
        macro_name: &str,
        stack_signature: (usize, usize),
        starting_offset: usize,
        program: LinkedProgram,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let mut jump_labels: Vec<(String, usize)> = program.jump_indices.into_iter().collect();
        jump_labels.sort_by(|left, right| left.1.cmp(&right.1).then_with(|| left.0.cmp(&right.0)));
        Self {
            macro_name: macro_name.to_string(),
            stack_signature,
            starting_offset,
            bytecode: to_hex(&program.bytes),
            bytes: program.bytes,
            sourcemap: program.sourcemap,
            diagnostics,
            jump_labels,
            table_offsets: program.table_offsets,
        }
    }

    pub fn macro_name(&self) -> &str {
        &self.macro_name
    }

    /// Declared `takes` count of the root macro.
    pub fn takes(&self) -> usize {
        self.stack_signature.0
    }

    /// Declared `returns` count of the root macro.
    pub fn returns(&self) -> usize {
        self.stack_signature.1
    }

    pub fn starting_offset(&self) -> usize {
        self.starting_offset
    }

    /// Lower-case hex of [`Self::bytes`].
    pub fn bytecode(&self) -> &str {
        &self.bytecode
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// One origin per emitted byte.
    pub fn sourcemap(&self) -> &[SourceOrigin] {
        &self.sourcemap
    }

    /// Warnings; a report never carries errors.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Resolved jump labels with absolute offsets, in offset order.
    pub fn jump_labels(&self) -> &[(String, usize)] {
        &self.jump_labels
    }

    pub fn table_offsets(&self) -> &[(String, usize)] {
        &self.table_offsets
    }
}

/// Compile `macro_name` from in-memory source named `<source>`.
pub fn compile_source(source: &str, macro_name: &str) -> Result<CompileReport, AsmRunError> {
    let file = preprocess::prepare_inline_source(INLINE_SOURCE_NAME, source)?;
    compile_files(vec![file], Vec::new(), macro_name, &CompileOptions::default())
}

/// Compile `macro_name` from `path` and everything it includes.
pub fn compile_file(
    path: &Path,
    macro_name: &str,
    options: &CompileOptions,
) -> Result<CompileReport, AsmRunError> {
    let loaded = preprocess::load_sources(path, &options.include_paths, options.max_depth)?;
    compile_files(loaded.files, loaded.warnings, macro_name, options)
}

fn compile_files(
    files: Vec<SourceFile>,
    mut warnings: Vec<Diagnostic>,
    macro_name: &str,
    options: &CompileOptions,
) -> Result<CompileReport, AsmRunError> {
    let map = InputMap::new(files);
    let declarations = parse_declarations(&map)?;
    let mut processor =
        MacroProcessor::new(declarations.macros).with_max_depth(options.max_depth);
    let root = processor.process_macro(macro_name, options.starting_offset)?;
    let stack_signature = processor
        .macros()
        .get(macro_name)
        .map_or((0, 0), |mac| (mac.takes, mac.returns));
    let mut program = link_tables(root, &declarations.tables, options.starting_offset)?;
    warnings.append(&mut program.warnings);
    Ok(CompileReport::new(
        macro_name,
        stack_signature,
        options.starting_offset,
        program,
        warnings,
    ))
}

/// Compile per the parsed command line and write the requested outputs.
/// Printing hex to stdout is left to the caller.
pub fn run_with_cli(cli: &Cli) -> Result<CompileReport, AsmRunError> {
    let config = validate_cli(cli)?;
    run_with_config(&config)
}

/// Like [`run_with_cli`] for a configuration that is already validated.
pub fn run_with_config(config: &CliConfig) -> Result<CompileReport, AsmRunError> {
    let options = CompileOptions {
        include_paths: config.include_paths.clone(),
        max_depth: config.max_depth,
        starting_offset: config.starting_offset,
    };
    let report = compile_file(&config.input_path, &config.macro_name, &options)?;

    if config.warning_policy.treat_warnings_as_errors {
        let warning_diags: Vec<Diagnostic> = report
            .diagnostics()
            .iter()
            .filter(|diag| diag.severity == Severity::Warning)
            .map(|diag| {
                let mut promoted = diag.clone();
                promoted.severity = Severity::Error;
                promoted
            })
            .collect();
        if let Some(first) = warning_diags.first() {
            return Err(AsmRunError::new(
                AsmError::new(first.kind(), "Warnings treated as errors (-Werror)", None),
                warning_diags,
            ));
        }
    }

    if let Some(path) = &config.outputs.hex_file {
        output::write_hex_file(path, &report)?;
    }
    if let Some(path) = &config.outputs.bin_file {
        output::write_bin_file(path, &report)?;
    }
    if let Some(path) = &config.outputs.sourcemap_file {
        output::write_sourcemap_file(path, &report)?;
    }
    Ok(report)
}
