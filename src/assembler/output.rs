// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError};

use super::CompileReport;

pub(super) fn write_hex_file(path: &Path, report: &CompileReport) -> Result<(), AsmRunError> {
    let mut text = report.bytecode().to_string();
    text.push('\n');
    write_output(path, text.as_bytes(), "hex")
}

pub(super) fn write_bin_file(path: &Path, report: &CompileReport) -> Result<(), AsmRunError> {
    write_output(path, report.bytes(), "binary")
}

pub(super) fn write_sourcemap_file(path: &Path, report: &CompileReport) -> Result<(), AsmRunError> {
    let payload = build_sourcemap_payload(report);
    let mut serialized = serde_json::to_string_pretty(&payload).map_err(|err| {
        AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Io,
                &format!("Error serializing source map: {err}"),
                None,
            ),
            Vec::new(),
        )
    })?;
    serialized.push('\n');
    write_output(path, serialized.as_bytes(), "source map")
}

/// Source map document: the root macro and its stack signature, the
/// bytecode, one entry per emitted byte, jump labels and table offsets.
pub(super) fn build_sourcemap_payload(report: &CompileReport) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = report
        .sourcemap()
        .iter()
        .enumerate()
        .map(|(index, origin)| {
            json!({
                "offset": report.starting_offset() + index,
                "file": origin.file,
                "line": origin.line,
                "text": origin.text,
            })
        })
        .collect();
    let labels: Vec<serde_json::Value> = report
        .jump_labels()
        .iter()
        .map(|(name, offset)| json!({ "name": name, "offset": offset }))
        .collect();
    let tables: Vec<serde_json::Value> = report
        .table_offsets()
        .iter()
        .map(|(name, offset)| json!({ "name": name, "offset": offset }))
        .collect();
    json!({
        "macro": report.macro_name(),
        "takes": report.takes(),
        "returns": report.returns(),
        "bytecode": report.bytecode(),
        "sourcemap": entries,
        "labels": labels,
        "tables": tables,
    })
}

fn write_output(path: &Path, contents: &[u8], what: &str) -> Result<(), AsmRunError> {
    fs::write(path, contents).map_err(|err| {
        AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Io,
                &format!("Error writing {what} file: {err}"),
                Some(path.to_string_lossy().as_ref()),
            ),
            Vec::new(),
        )
    })
}
