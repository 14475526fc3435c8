// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Table linking.
//!
//! Appends jump and code tables after the root expansion, separated by one
//! zero byte, and patches every `__tablestart` placeholder with its table's
//! absolute offset.

use std::collections::HashMap;

use crate::core::assembler::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::macro_processor::{ExpansionResult, MAX_PLACEHOLDER_VALUE};
use crate::core::opcodes::STOP;
use crate::core::parser::{entry_width, JumpTable, TableBody, TableSet};
use crate::core::source_map::SourceOrigin;

/// Final program image after table linking.
#[derive(Debug, Clone, Default)]
pub struct LinkedProgram {
    pub bytes: Vec<u8>,
    pub sourcemap: Vec<SourceOrigin>,
    /// Absolute start offset of each table, in link order.
    pub table_offsets: Vec<(String, usize)>,
    pub jump_indices: HashMap<String, usize>,
    pub warnings: Vec<Diagnostic>,
}

/// Link `tables` onto `root`, whose first byte sits at `start_offset`.
pub fn link_tables(
    root: ExpansionResult,
    tables: &TableSet,
    start_offset: usize,
) -> Result<LinkedProgram, AsmError> {
    let mut root = root;
    let mut warnings = Vec::new();
    let mut appended = Vec::new();
    let mut appended_map = Vec::new();
    let mut table_offsets = Vec::with_capacity(tables.len());

    if let Some(first) = tables.iter().next() {
        appended.push(STOP);
        appended_map.push(first.origin.clone());
    }
    let mut offset = start_offset + root.len() + appended.len();
    for table in tables.iter() {
        table_offsets.push((table.name.clone(), offset));
        let payload = table_payload(table, offset, &root.jump_indices, &mut warnings)?;
        offset += payload.len();
        appended_map.extend(std::iter::repeat(&table.origin).take(payload.len()).cloned());
        appended.extend(payload);
    }

    let offsets: HashMap<&str, usize> = table_offsets
        .iter()
        .map(|(name, offset)| (name.as_str(), *offset))
        .collect();
    let instances = std::mem::take(&mut root.table_instances);
    for instance in &instances {
        let Some(table_offset) = offsets.get(instance.table.as_str()) else {
            return Err(AsmError::new(
                AsmErrorKind::Table,
                "unknown table referenced by __tablestart",
                Some(&instance.table),
            )
            .with_origin(&instance.origin));
        };
        let relative = instance.offset.checked_sub(start_offset).ok_or_else(|| {
            AsmError::new(
                AsmErrorKind::Table,
                &format!("table placeholder offset {} precedes the program", instance.offset),
                None,
            )
            .with_origin(&instance.origin)
        })?;
        root.patch_placeholder(relative, *table_offset, &instance.origin)?;
    }

    if let Some(&leftover) = root.placeholders.iter().next() {
        let origin = root.sourcemap.get(leftover).cloned();
        let err = AsmError::new(
            AsmErrorKind::Table,
            &format!("placeholder at offset {} was never patched", start_offset + leftover),
            None,
        );
        return Err(match origin {
            Some(origin) => err.with_origin(&origin),
            None => err,
        });
    }

    let mut bytes = root.bytes;
    bytes.extend(appended);
    let mut sourcemap = root.sourcemap;
    sourcemap.extend(appended_map);
    Ok(LinkedProgram {
        bytes,
        sourcemap,
        table_offsets,
        jump_indices: root.jump_indices,
        warnings,
    })
}

fn table_payload(
    table: &JumpTable,
    table_offset: usize,
    jump_indices: &HashMap<String, usize>,
    warnings: &mut Vec<Diagnostic>,
) -> Result<Vec<u8>, AsmError> {
    let (labels, packed) = match &table.body {
        TableBody::Code(bytes) => return Ok(bytes.clone()),
        TableBody::Jumps { labels, packed } => (labels, *packed),
    };
    let width = entry_width(packed);
    let mut payload = Vec::with_capacity(labels.len() * width);
    for (idx, label) in labels.iter().enumerate() {
        let mut slot = vec![0u8; width];
        match jump_indices.get(label) {
            Some(&target) if target > MAX_PLACEHOLDER_VALUE => {
                return Err(AsmError::new(
                    AsmErrorKind::ArithmeticRange,
                    &format!(
                        "offset 0x{target:x} of label '{label}' does not fit jumptable '{}'",
                        table.name
                    ),
                    None,
                )
                .with_origin(&table.origin));
            }
            Some(&target) => {
                let encoded = (target as u16).to_be_bytes();
                slot[width - 2..].copy_from_slice(&encoded);
            }
            None => {
                let err = AsmError::new(
                    AsmErrorKind::Table,
                    &format!("jumptable '{}' entry is not a known label; slot zero-filled", table.name),
                    Some(label),
                )
                .with_origin(&table.origin);
                warnings.push(
                    Diagnostic::from_error(Severity::Warning, err).with_note(format!(
                        "{width} zero bytes at offset 0x{:x}",
                        table_offset + idx * width
                    )),
                );
            }
        }
        payload.extend(slot);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::macro_processor::MacroProcessor;
    use crate::core::parser::parse_declarations;
    use crate::core::source_map::{InputMap, SourceFile};
    use crate::core::text_utils::to_hex;

    fn link(source: &str, start_offset: usize) -> Result<LinkedProgram, AsmError> {
        let map = InputMap::new(vec![SourceFile::new("link.sf", source)]);
        let decls = parse_declarations(&map).expect("declarations");
        let mut mp = MacroProcessor::new(decls.macros);
        let root = mp.process_macro("MAIN", start_offset).expect("expand");
        link_tables(root, &decls.tables, start_offset)
    }

    #[test]
    fn no_tables_means_no_separator() {
        let program = link("#define macro MAIN = takes(0) returns(0) { stop }", 0).expect("link");
        assert_eq!(program.bytes, vec![0x00]);
        assert!(program.table_offsets.is_empty());
    }

    #[test]
    fn packed_and_unpacked_jump_tables() {
        let source = "jumptable__packed PACKED { a b c }\n\
                      jumptable WIDE { a b c }\n\
                      #define macro MAIN = takes(0) returns(0) { a: b: c: stop }";
        let program = link(source, 0).expect("link");
        // 3 jumpdests + stop, separator, 6 packed bytes, 96 unpacked bytes
        assert_eq!(program.bytes.len(), 4 + 1 + 6 + 96);
        assert_eq!(program.table_offsets, vec![("PACKED".to_string(), 5), ("WIDE".to_string(), 11)]);
        assert_eq!(to_hex(&program.bytes[5..11]), "000000010002");
        assert!(program.bytes[11..11 + 30].iter().all(|b| *b == 0));
        assert_eq!(&program.bytes[11 + 30..11 + 32], &[0x00, 0x00]);
        assert_eq!(&program.bytes[11 + 62..11 + 64], &[0x00, 0x01]);
        assert_eq!(program.sourcemap.len(), program.bytes.len());
        assert_eq!(program.sourcemap[6].line, 1);
        assert_eq!(program.sourcemap[20].line, 2);
        assert!(program.warnings.is_empty());
    }

    #[test]
    fn table_start_is_patched_with_true_offset() {
        let source = "table CODES { 0xdead 0xbeef }\n\
                      #define macro MAIN = takes(0) returns(0) { __tablestart(CODES) __tablesize(CODES) codecopy }";
        let program = link(source, 0).expect("link");
        // push2 0007 | push1 04 | codecopy | 00 | dead beef
        assert_eq!(to_hex(&program.bytes), "61000760043900deadbeef");
    }

    #[test]
    fn start_offset_carries_into_table_offsets() {
        let source = "table T { 0x01 }\n\
                      #define macro MAIN = takes(0) returns(0) { __tablestart(T) }";
        let program = link(source, 0x20).expect("link");
        assert_eq!(program.table_offsets, vec![("T".to_string(), 0x24)]);
        assert_eq!(to_hex(&program.bytes), "6100240001");
    }

    #[test]
    fn unresolved_entry_is_zero_filled_with_warning() {
        let source = "jumptable__packed JT { known missing }\n\
                      #define macro MAIN = takes(0) returns(0) { 0x00 known: stop }";
        let program = link(source, 0).expect("link");
        assert_eq!(to_hex(&program.bytes[5..]), "00020000");
        assert_eq!(program.warnings.len(), 1);
        let warning = &program.warnings[0];
        assert_eq!(warning.severity(), Severity::Warning);
        assert_eq!(warning.code(), "sft001");
        assert!(warning.message().contains("missing"));
        assert_eq!(warning.notes(), ["2 zero bytes at offset 0x7".to_string()]);
    }

    #[test]
    fn unknown_table_instance_is_table_error() {
        let source = "#define macro MAIN = takes(0) returns(0) { __tablestart(NOPE) }";
        let err = link(source, 0).expect_err("unknown table");
        assert_eq!(err.kind(), AsmErrorKind::Table);
        assert!(err.message().contains("NOPE"));
    }

    #[test]
    fn label_beyond_two_bytes_is_range_error() {
        let source = "jumptable__packed JT { far }\n\
                      #define macro MAIN = takes(0) returns(0) { far: stop }";
        let err = link(source, 0x1_0000).expect_err("too far");
        assert_eq!(err.kind(), AsmErrorKind::ArithmeticRange);
    }
}
