// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Recursive macro expansion with template substitution and jump-label
// resolution across nested invocations.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use num_bigint::BigUint;

use crate::core::assembler::error::{AsmError, AsmErrorKind, AsmRunError, Diagnostic, Severity};
use crate::core::expr::{minimal_bytes, LiteralContext};
use crate::core::opcodes::{push_opcode_for_width, push_width, JUMPDEST, PUSH2};
use crate::core::parser::{Macro, MacroTable};
use crate::core::source_map::SourceOrigin;
use crate::core::text_utils::{replace_words, split_commas_ignoring_templates, to_hex};
use crate::core::tokenizer::{split_name_and_template_args, OpKind};

#[path = "macro_processor_templates.rs"]
mod macro_processor_templates;

pub const DEFAULT_MAX_DEPTH: usize = 256;
pub const MAX_PLACEHOLDER_VALUE: usize = 0xffff;

/// A label reference not resolvable inside the expansion that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedJump {
    pub label: String,
    /// Offset of the `PUSH2` byte, relative to the expansion start.
    pub offset: usize,
    pub origin: SourceOrigin,
}

/// A `__tablestart` placeholder waiting for its table's final offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInstance {
    pub table: String,
    /// Absolute offset of the `PUSH2` byte.
    pub offset: usize,
    pub origin: SourceOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct ExpansionResult {
    pub bytes: Vec<u8>,
    /// One origin per emitted byte.
    pub sourcemap: Vec<SourceOrigin>,
    /// Labels resolved in this expansion, at absolute offsets.
    pub jump_indices: HashMap<String, usize>,
    pub unmatched_jumps: Vec<UnmatchedJump>,
    pub table_instances: Vec<TableInstance>,
    /// Relative offsets of placeholders whose operand has not been written.
    pub placeholders: BTreeSet<usize>,
}

impl ExpansionResult {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytecode(&self) -> String {
        to_hex(&self.bytes)
    }

    pub(crate) fn emit(&mut self, bytes: &[u8], origin: &SourceOrigin) {
        self.bytes.extend_from_slice(bytes);
        self.sourcemap
            .extend(std::iter::repeat(origin).take(bytes.len()).cloned());
    }

    /// Emit `PUSH2 00 00` and return its relative offset.
    fn emit_placeholder(&mut self, origin: &SourceOrigin) -> usize {
        let offset = self.bytes.len();
        self.emit(&[PUSH2, 0x00, 0x00], origin);
        self.placeholders.insert(offset);
        offset
    }

    /// Append a child expansion; its unmatched jumps become pending here.
    fn splice(&mut self, child: ExpansionResult, pending: &mut Vec<UnmatchedJump>) {
        let base = self.bytes.len();
        self.bytes.extend(child.bytes);
        self.sourcemap.extend(child.sourcemap);
        self.jump_indices.extend(child.jump_indices);
        self.table_instances.extend(child.table_instances);
        self.placeholders
            .extend(child.placeholders.into_iter().map(|offset| offset + base));
        pending.extend(child.unmatched_jumps.into_iter().map(|jump| UnmatchedJump {
            offset: jump.offset + base,
            ..jump
        }));
    }

    /// Write `value` into the placeholder at relative `offset`.
    pub fn patch_placeholder(
        &mut self,
        offset: usize,
        value: usize,
        origin: &SourceOrigin,
    ) -> Result<(), AsmError> {
        if !self.placeholders.contains(&offset) || self.bytes.get(offset) != Some(&PUSH2) {
            return Err(AsmError::new(
                AsmErrorKind::Table,
                &format!("expected an unpatched placeholder at offset {offset}"),
                None,
            )
            .with_origin(origin));
        }
        if value > MAX_PLACEHOLDER_VALUE {
            return Err(AsmError::new(
                AsmErrorKind::ArithmeticRange,
                &format!("offset 0x{value:x} does not fit a two-byte placeholder"),
                None,
            )
            .with_origin(origin));
        }
        let [hi, lo] = (value as u16).to_be_bytes();
        self.bytes[offset + 1] = hi;
        self.bytes[offset + 2] = lo;
        self.placeholders.remove(&offset);
        Ok(())
    }
}

/// Parameter-name to argument-text bindings of one macro invocation.
struct Bindings<'a> {
    params: &'a [String],
    args: &'a [String],
}

impl<'a> Bindings<'a> {
    fn lookup(&self, word: &str) -> Option<&'a str> {
        self.params
            .iter()
            .position(|param| param == word)
            .and_then(|idx| self.args.get(idx))
            .map(String::as_str)
    }

    fn substitute(&self, text: &str) -> String {
        replace_words(text, |word| self.lookup(word))
    }

    fn substitute_all(&self, texts: &[String]) -> Vec<String> {
        texts.iter().map(|text| self.substitute(text)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    name: String,
    args: Vec<String>,
}

/// Expands macros against a macro table, extending it with synthetic
/// macros for instantiated template arguments.
pub struct MacroProcessor {
    macros: MacroTable,
    max_depth: usize,
    active: Vec<Frame>,
    inline_counter: usize,
}

impl MacroProcessor {
    pub fn new(macros: MacroTable) -> Self {
        Self {
            macros,
            max_depth: DEFAULT_MAX_DEPTH,
            active: Vec::new(),
            inline_counter: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Expand the root macro. Labels still unresolved at this level are fatal
    /// and reported one diagnostic per reference.
    pub fn process_macro(
        &mut self,
        name: &str,
        start_offset: usize,
    ) -> Result<ExpansionResult, AsmRunError> {
        let result = self.expand(name, start_offset, &[], None)?;
        if result.unmatched_jumps.is_empty() {
            return Ok(result);
        }
        let labels: Vec<&str> = result
            .unmatched_jumps
            .iter()
            .map(|jump| jump.label.as_str())
            .collect();
        let error = AsmError::new(
            AsmErrorKind::UnmatchedJump,
            &format!("originating macro {name}, unknown jump labels, cannot compile"),
            Some(&labels.join(", ")),
        );
        let diagnostics = result
            .unmatched_jumps
            .iter()
            .map(|jump| {
                let err = AsmError::new(
                    AsmErrorKind::UnmatchedJump,
                    "unknown jump label",
                    Some(&jump.label),
                )
                .with_origin(&jump.origin);
                Diagnostic::from_error(Severity::Error, err).with_help(
                    "check for a macro call missing its '()' or a misspelled label or opcode",
                )
            })
            .collect();
        Err(AsmRunError::new(error, diagnostics))
    }

    /// Expand `name` with raw template `args` at absolute `start_offset`.
    pub fn expand(
        &mut self,
        name: &str,
        start_offset: usize,
        args: &[String],
        call_site: Option<&SourceOrigin>,
    ) -> Result<ExpansionResult, AsmError> {
        let Some(mac) = self.macros.get(name) else {
            let err = AsmError::new(AsmErrorKind::Name, "unknown macro", Some(name));
            return Err(match call_site {
                Some(origin) => err.with_origin(origin),
                None => err,
            });
        };
        let args: Vec<String> = args
            .iter()
            .flat_map(|arg| split_commas_ignoring_templates(arg))
            .collect();
        if mac.template_params.len() != args.len() {
            return Err(AsmError::new(
                AsmErrorKind::Arity,
                &format!(
                    "macro {name} expects {} template arguments but was given {}",
                    mac.template_params.len(),
                    args.len()
                ),
                None,
            )
            .with_origin(call_site.unwrap_or(&mac.origin)));
        }
        self.enter(name, &args, call_site.unwrap_or(&mac.origin))?;
        let result = self.expand_ops(&mac, start_offset, &args);
        self.active.pop();
        result
    }

    fn enter(&mut self, name: &str, args: &[String], origin: &SourceOrigin) -> Result<(), AsmError> {
        let frame = Frame {
            name: name.to_string(),
            args: args.to_vec(),
        };
        if let Some(idx) = self.active.iter().position(|active| *active == frame) {
            let mut cycle: Vec<&str> = self.active[idx..]
                .iter()
                .map(|active| active.name.as_str())
                .collect();
            cycle.push(name);
            return Err(AsmError::new(
                AsmErrorKind::Recursion,
                "recursive macro expansion",
                Some(&cycle.join(" -> ")),
            )
            .with_origin(origin));
        }
        if self.active.len() >= self.max_depth {
            return Err(AsmError::new(
                AsmErrorKind::Recursion,
                &format!("macro nesting exceeds the maximum depth of {}", self.max_depth),
                Some(name),
            )
            .with_origin(origin));
        }
        self.active.push(frame);
        Ok(())
    }

    fn expand_ops(
        &mut self,
        mac: &Rc<Macro>,
        start_offset: usize,
        args: &[String],
    ) -> Result<ExpansionResult, AsmError> {
        let bindings = Bindings {
            params: &mac.template_params,
            args,
        };
        let mut out = ExpansionResult::default();
        let mut pending = Vec::new();
        for op in &mac.ops {
            let offset = start_offset + out.len();
            match &op.kind {
                OpKind::MacroInvocation { name, args } => {
                    let call_args = bindings.substitute_all(args);
                    let child = self.expand(name, offset, &call_args, Some(&op.origin))?;
                    out.splice(child, &mut pending);
                }
                OpKind::TemplateInvocation(text) => {
                    let value = bindings.substitute(text);
                    let (target, call_args) = match split_name_and_template_args(&value) {
                        Some((name, call_args)) if !call_args.is_empty() => {
                            (name.to_string(), call_args)
                        }
                        _ => (value.trim().to_string(), Vec::new()),
                    };
                    let resolved = self.resolve_template(&target, op)?;
                    let child = self.expand(&resolved, offset, &call_args, Some(&op.origin))?;
                    out.splice(child, &mut pending);
                }
                OpKind::CodeSize { name, args } => {
                    let size = self.code_size(name, &bindings.substitute_all(args), &op.origin)?;
                    let data = minimal_bytes(&BigUint::from(size));
                    let Some(opcode) = push_opcode_for_width(data.len()) else {
                        return Err(AsmError::new(
                            AsmErrorKind::ArithmeticRange,
                            "code size does not fit a push",
                            Some(name),
                        )
                        .with_origin(&op.origin));
                    };
                    out.emit(&[opcode], &op.origin);
                    out.emit(&data, &op.origin);
                }
                OpKind::Opcode(opcode) => out.emit(&[*opcode], &op.origin),
                OpKind::Push { opcode, data } => {
                    if push_width(*opcode) != Some(data.len()) {
                        return Err(AsmError::new(
                            AsmErrorKind::Arity,
                            &format!(
                                "push opcode 0x{opcode:02x} does not match its {}-byte argument",
                                data.len()
                            ),
                            None,
                        )
                        .with_origin(&op.origin));
                    }
                    out.emit(&[*opcode], &op.origin);
                    out.emit(data, &op.origin);
                }
                OpKind::PushJumpLabel(label) => {
                    let offset = out.emit_placeholder(&op.origin);
                    pending.push(UnmatchedJump {
                        label: label.clone(),
                        offset,
                        origin: op.origin.clone(),
                    });
                }
                OpKind::TableStartPosition(table) => {
                    let rel = out.emit_placeholder(&op.origin);
                    out.table_instances.push(TableInstance {
                        table: table.clone(),
                        offset: start_offset + rel,
                        origin: op.origin.clone(),
                    });
                }
                OpKind::JumpDest(label) => {
                    out.jump_indices.insert(label.clone(), offset);
                    out.emit(&[JUMPDEST], &op.origin);
                }
            }
        }
        for jump in pending {
            match out.jump_indices.get(&jump.label).copied() {
                Some(target) => out.patch_placeholder(jump.offset, target, &jump.origin)?,
                None => out.unmatched_jumps.push(jump),
            }
        }
        Ok(out)
    }
}

impl LiteralContext for MacroProcessor {
    fn lookup_macro(&self, name: &str) -> Option<Rc<Macro>> {
        self.macros.get(name)
    }

    fn code_size(
        &mut self,
        name: &str,
        args: &[String],
        origin: &SourceOrigin,
    ) -> Result<usize, AsmError> {
        self.expand(name, 0, args, Some(origin)).map(|result| result.len())
    }
}
