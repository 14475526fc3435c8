// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Template argument resolution: classifies a bound argument and, unless it
// already names a macro, wraps it in a synthetic single-operation macro.

use super::MacroProcessor;
use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{evaluate, is_literal, is_modified_opcode, modified_opcode};
use crate::core::opcodes::opcode_for;
use crate::core::parser::Macro;
use crate::core::text_utils::is_ident;
use crate::core::tokenizer::{Op, OpKind};

impl MacroProcessor {
    /// Resolve `arg` for the template reference `op`, returning the name of
    /// the macro to expand in its place.
    pub(super) fn resolve_template(&mut self, arg: &str, op: &Op) -> Result<String, AsmError> {
        let kind = if is_literal(arg) {
            let value = evaluate(arg, self, &op.origin)?;
            OpKind::push_value(&value).ok_or_else(|| {
                AsmError::new(AsmErrorKind::ArithmeticRange, "literal does not fit a push", Some(arg))
                    .with_origin(&op.origin)
            })?
        } else if is_modified_opcode(arg) {
            OpKind::Opcode(modified_opcode(arg, &op.origin)?)
        } else if let Some(opcode) = opcode_for(arg) {
            OpKind::Opcode(opcode)
        } else if self.macros.contains(arg) {
            return Ok(arg.to_string());
        } else if let Some(inner) = arg.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) {
            OpKind::TemplateInvocation(inner.trim().to_string())
        } else if is_ident(arg) {
            OpKind::PushJumpLabel(arg.to_string())
        } else {
            return Err(AsmError::new(
                AsmErrorKind::Parse,
                "cannot resolve template argument",
                Some(arg),
            )
            .with_origin(&op.origin));
        };
        let name = self.next_inline_name(arg);
        self.macros.insert(Macro {
            name: name.clone(),
            takes: 0,
            returns: 0,
            template_params: Vec::new(),
            ops: vec![Op {
                kind,
                source_index: op.source_index,
                origin: op.origin.clone(),
            }],
            body: arg.to_string(),
            origin: op.origin.clone(),
        })?;
        Ok(name)
    }

    /// `inline-<arg>-<n>`; `-` never appears in declared names.
    fn next_inline_name(&mut self, arg: &str) -> String {
        let name = format!("inline-{arg}-{}", self.inline_counter);
        self.inline_counter += 1;
        name
    }
}
