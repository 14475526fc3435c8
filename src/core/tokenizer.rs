// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Macro body tokenizer.
//!
//! Converts the text between a macro's braces into typed operations. At each
//! position the matchers are tried in a fixed priority order and the first
//! one that accepts the input wins.

use std::collections::HashSet;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{minimal_bytes, parse_number};
use crate::core::opcodes::{opcode_for, push_opcode_for_width, push_width, MAX_PUSH_WIDTH};
use crate::core::parser::TableSet;
use crate::core::source_map::{InputMap, SourceOrigin};
use crate::core::text_utils::{hex_to_bytes, is_blank, is_ident, is_ident_char, Cursor};

use num_bigint::BigUint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    Opcode(u8),
    /// Push opcode and its immediate bytes, big-endian.
    Push { opcode: u8, data: Vec<u8> },
    JumpDest(String),
    /// `PUSH2` placeholder for a label that may be defined anywhere in scope.
    PushJumpLabel(String),
    MacroInvocation { name: String, args: Vec<String> },
    /// Template argument reference; holds the text between the brackets.
    TemplateInvocation(String),
    CodeSize { name: String, args: Vec<String> },
    TableStartPosition(String),
}

impl OpKind {
    /// A push with the opcode matching the width of `data`.
    pub fn push(data: Vec<u8>) -> Option<Self> {
        let opcode = push_opcode_for_width(data.len())?;
        Some(Self::Push { opcode, data })
    }

    pub fn push_value(value: &BigUint) -> Option<Self> {
        Self::push(minimal_bytes(value))
    }

    /// Encoded length; placeholders count their `PUSH2` and two offset bytes.
    pub fn byte_len(&self) -> Option<usize> {
        match self {
            Self::Opcode(_) | Self::JumpDest(_) => Some(1),
            Self::Push { opcode, .. } => push_width(*opcode).map(|width| width + 1),
            Self::PushJumpLabel(_) | Self::TableStartPosition(_) => Some(3),
            Self::MacroInvocation { .. } | Self::TemplateInvocation(_) | Self::CodeSize { .. } => {
                None
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Op {
    pub kind: OpKind,
    /// Byte offset of the token in the flattened source.
    pub source_index: usize,
    pub origin: SourceOrigin,
}

struct BodyTokenizer<'a> {
    cursor: Cursor<'a>,
    base: usize,
    tables: &'a TableSet,
    map: &'a InputMap,
    labels: HashSet<String>,
    ops: Vec<Op>,
}

/// Tokenize a macro body that starts at byte `base` of the flattened source.
pub fn tokenize_body(
    body: &str,
    base: usize,
    tables: &TableSet,
    map: &InputMap,
) -> Result<Vec<Op>, AsmError> {
    let mut tokenizer = BodyTokenizer {
        cursor: Cursor::new(body),
        base,
        tables,
        map,
        labels: HashSet::new(),
        ops: Vec::new(),
    };
    tokenizer.run()?;
    Ok(tokenizer.ops)
}

type Matcher<'a> = fn(&mut BodyTokenizer<'a>, &SourceOrigin) -> Result<Option<OpKind>, AsmError>;

impl<'a> BodyTokenizer<'a> {
    fn run(&mut self) -> Result<(), AsmError> {
        let matchers: [Matcher<'a>; 9] = [
            Self::match_code_size,
            Self::match_table_size,
            Self::match_table_start,
            // Names never start with `0x`, so hex goes ahead of calls and labels.
            Self::match_hex_literal,
            Self::match_macro_call,
            Self::match_template,
            Self::match_jump_label,
            Self::match_decimal_literal,
            Self::match_identifier,
        ];
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.is_eof() {
                return Ok(());
            }
            let start = self.cursor.pos();
            let source_index = self.base + start;
            let origin = self.map.origin_at(source_index);
            let mut matched = None;
            for matcher in matchers {
                self.cursor.set_pos(start);
                if let Some(kind) = matcher(self, &origin)? {
                    matched = Some(kind);
                    break;
                }
            }
            let Some(kind) = matched else {
                self.cursor.set_pos(start);
                return Err(AsmError::new(
                    AsmErrorKind::Parse,
                    "cannot parse token",
                    Some(self.cursor.current_line_rest().trim()),
                )
                .with_origin(&origin));
            };
            self.ops.push(Op {
                kind,
                source_index,
                origin,
            });
        }
    }

    /// `__name(` prefix of a builtin; returns the text inside the parens.
    fn builtin_argument(
        &mut self,
        builtin: &str,
        origin: &SourceOrigin,
    ) -> Result<Option<&'a str>, AsmError> {
        if !self.cursor.eat_keyword(builtin) {
            return Ok(None);
        }
        match self.cursor.take_balanced('(', ')') {
            Some(inner) => Ok(Some(inner.trim())),
            None => Err(AsmError::new(
                AsmErrorKind::Parse,
                "expected parenthesised name after",
                Some(builtin),
            )
            .with_origin(origin)),
        }
    }

    fn match_code_size(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        let Some(inner) = self.builtin_argument("__codesize", origin)? else {
            return Ok(None);
        };
        let (name, args) = split_name_and_template_args(inner).ok_or_else(|| {
            AsmError::new(AsmErrorKind::Parse, "malformed __codesize argument", Some(inner))
                .with_origin(origin)
        })?;
        Ok(Some(OpKind::CodeSize {
            name: name.to_string(),
            args,
        }))
    }

    fn match_table_size(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        let Some(name) = self.builtin_argument("__tablesize", origin)? else {
            return Ok(None);
        };
        let Some(table) = self.tables.get(name) else {
            return Err(
                AsmError::new(AsmErrorKind::Name, "unknown table", Some(name)).with_origin(origin),
            );
        };
        Ok(OpKind::push_value(&BigUint::from(table.size())))
    }

    fn match_table_start(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        let Some(name) = self.builtin_argument("__tablestart", origin)? else {
            return Ok(None);
        };
        if !is_ident(name) {
            return Err(
                AsmError::new(AsmErrorKind::Parse, "malformed table name", Some(name))
                    .with_origin(origin),
            );
        }
        Ok(Some(OpKind::TableStartPosition(name.to_string())))
    }

    fn match_macro_call(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        let Some(name) = self.cursor.take_ident() else {
            return Ok(None);
        };
        let angle = if self.cursor.peek() == Some('<') {
            match self.cursor.take_balanced('<', '>') {
                Some(inner) => Some(inner),
                None => return Ok(None),
            }
        } else {
            None
        };
        let Some(paren) = self.cursor.take_balanced('(', ')') else {
            return Ok(None);
        };
        let raw_args = match (angle, is_blank(paren)) {
            (Some(_), false) => {
                return Err(AsmError::new(
                    AsmErrorKind::Parse,
                    "macro call mixes template and parenthesised arguments",
                    Some(name),
                )
                .with_origin(origin));
            }
            (Some(inner), true) => inner,
            (None, _) => paren,
        };
        let args = if is_blank(raw_args) {
            Vec::new()
        } else {
            vec![raw_args.trim().to_string()]
        };
        Ok(Some(OpKind::MacroInvocation {
            name: name.to_string(),
            args,
        }))
    }

    fn match_template(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        if self.cursor.peek() != Some('<') {
            return Ok(None);
        }
        match self.cursor.take_balanced('<', '>') {
            Some(inner) if !is_blank(inner) => {
                Ok(Some(OpKind::TemplateInvocation(inner.trim().to_string())))
            }
            _ => Err(
                AsmError::new(AsmErrorKind::Parse, "malformed template reference", None)
                    .with_origin(origin),
            ),
        }
    }

    fn match_jump_label(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        let Some(label) = self.cursor.take_ident() else {
            return Ok(None);
        };
        if !self.cursor.eat_char(':') {
            return Ok(None);
        }
        if !self.labels.insert(label.to_string()) {
            return Err(AsmError::new(
                AsmErrorKind::Name,
                "jump label has already been defined",
                Some(label),
            )
            .with_origin(origin));
        }
        Ok(Some(OpKind::JumpDest(label.to_string())))
    }

    fn match_hex_literal(&mut self, origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        if !self.cursor.eat_str("0x") {
            return Ok(None);
        }
        let digits = self.cursor.take_while(|c| c.is_ascii_hexdigit());
        if digits.is_empty() || self.cursor.peek().is_some_and(is_ident_char) {
            let tail = self.cursor.take_while(is_ident_char);
            return Err(AsmError::new(
                AsmErrorKind::Parse,
                "malformed hex literal",
                Some(&format!("0x{digits}{tail}")),
            )
            .with_origin(origin));
        }
        let data = hex_to_bytes(digits).unwrap_or_default();
        push_literal(data, digits, origin).map(Some)
    }

    fn match_decimal_literal(
        &mut self,
        origin: &SourceOrigin,
    ) -> Result<Option<OpKind>, AsmError> {
        let digits = self.cursor.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() || self.cursor.peek().is_some_and(is_ident_char) {
            return Ok(None);
        }
        let value = parse_number(digits).unwrap_or_default();
        push_literal(minimal_bytes(&value), digits, origin).map(Some)
    }

    fn match_identifier(&mut self, _origin: &SourceOrigin) -> Result<Option<OpKind>, AsmError> {
        let Some(word) = self.cursor.take_ident() else {
            return Ok(None);
        };
        // A label defined earlier in this body shadows a mnemonic of the same name.
        if self.labels.contains(word) {
            return Ok(Some(OpKind::PushJumpLabel(word.to_string())));
        }
        Ok(Some(match opcode_for(word) {
            Some(opcode) => OpKind::Opcode(opcode),
            None => OpKind::PushJumpLabel(word.to_string()),
        }))
    }
}

fn push_literal(data: Vec<u8>, text: &str, origin: &SourceOrigin) -> Result<OpKind, AsmError> {
    if data.len() > MAX_PUSH_WIDTH {
        return Err(AsmError::new(
            AsmErrorKind::Parse,
            "literal is wider than 32 bytes",
            Some(text),
        )
        .with_origin(origin));
    }
    OpKind::push(data).ok_or_else(|| {
        AsmError::new(AsmErrorKind::Parse, "invalid push literal", Some(text)).with_origin(origin)
    })
}

/// Split `NAME` or `NAME<args>` into the name and its raw argument group.
pub fn split_name_and_template_args(text: &str) -> Option<(&str, Vec<String>)> {
    let text = text.trim();
    let name_len = text
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    if name_len == 0 {
        return None;
    }
    let (name, rest) = text.split_at(name_len);
    let rest = rest.trim();
    if rest.is_empty() {
        return Some((name, Vec::new()));
    }
    let mut cursor = Cursor::new(rest);
    let inner = cursor.take_balanced('<', '>')?;
    if !cursor.is_eof() {
        return None;
    }
    let args = if is_blank(inner) {
        Vec::new()
    } else {
        vec![inner.trim().to_string()]
    };
    Some((name, args))
}
