// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Literal and arithmetic evaluation.
//!
//! Literals are hex (`0x..`) or decimal numbers, constant macros holding a
//! single push or `__codesize`, and `+ - *` expressions over those. Operators
//! are split in the order `-`, `+`, `*` and folded left to right, so
//! `a-b+c` reads as `a-(b+c)`. Every result is reduced modulo 2^256.

use std::rc::Rc;

use num_bigint::BigUint;
use num_traits::{CheckedSub, One, ToPrimitive, Zero};

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::opcodes::opcode_for;
use crate::core::parser::Macro;
use crate::core::source_map::SourceOrigin;
use crate::core::tokenizer::OpKind;

const OPERATORS: [char; 3] = ['-', '+', '*'];

/// Context for literal evaluation.
///
/// Resolves constant macros by name and measures macro expansions for
/// `__codesize` constants.
pub trait LiteralContext {
    fn lookup_macro(&self, name: &str) -> Option<Rc<Macro>>;

    /// Byte length of `name` expanded with `args`.
    fn code_size(
        &mut self,
        name: &str,
        args: &[String],
        origin: &SourceOrigin,
    ) -> Result<usize, AsmError>;
}

/// Parse a hex (`0x..`) or decimal literal.
pub fn parse_number(text: &str) -> Option<BigUint> {
    if let Some(hex) = text.strip_prefix("0x") {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return BigUint::parse_bytes(hex.as_bytes(), 16);
    }
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(text.as_bytes(), 10)
}

fn word_modulus() -> BigUint {
    BigUint::one() << 256usize
}

/// Reduce into the 256-bit word range.
pub fn normalize(value: BigUint) -> BigUint {
    value % word_modulus()
}

/// Minimal big-endian bytes of `value`; zero encodes as one byte.
pub fn minimal_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        vec![0]
    } else {
        value.to_bytes_be()
    }
}

/// True when `text` has an arithmetic operator outside any `<...>` group.
pub fn contains_operator(text: &str) -> bool {
    OPERATORS
        .iter()
        .any(|op| split_top_level(text, *op).len() > 1)
}

/// Numbers and operator expressions count as literals; a stack-opcode
/// offset such as `dup1+2` does not.
pub fn is_literal(text: &str) -> bool {
    let text = text.trim();
    parse_number(text).is_some() || (contains_operator(text) && !is_modified_opcode(text))
}

/// Evaluate a literal expression to a value in the 256-bit word range.
pub fn evaluate(
    text: &str,
    ctx: &mut dyn LiteralContext,
    origin: &SourceOrigin,
) -> Result<BigUint, AsmError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    evaluate_compact(&compact, ctx, origin)
}

fn evaluate_compact(
    text: &str,
    ctx: &mut dyn LiteralContext,
    origin: &SourceOrigin,
) -> Result<BigUint, AsmError> {
    if text.is_empty() {
        return Err(literal_error("missing operand in literal", text, origin));
    }
    for op in OPERATORS {
        let parts = split_top_level(text, op);
        if parts.len() == 1 {
            continue;
        }
        let mut acc = evaluate_compact(parts[0], ctx, origin)?;
        for part in &parts[1..] {
            let value = evaluate_compact(part, ctx, origin)?;
            acc = apply_operator(op, acc, value);
        }
        return Ok(acc);
    }
    if let Some(inner) = strip_template_brackets(text) {
        return evaluate_compact(inner, ctx, origin);
    }
    if let Some(value) = parse_number(text) {
        return Ok(normalize(value));
    }
    if let Some(mac) = ctx.lookup_macro(text) {
        return constant_macro_value(&mac, ctx, origin);
    }
    Err(literal_error("cannot process literal", text, origin))
}

fn apply_operator(op: char, lhs: BigUint, rhs: BigUint) -> BigUint {
    match op {
        '-' => normalize(lhs + word_modulus() - rhs),
        '+' => normalize(lhs + rhs),
        _ => normalize(lhs * rhs),
    }
}

fn constant_macro_value(
    mac: &Macro,
    ctx: &mut dyn LiteralContext,
    origin: &SourceOrigin,
) -> Result<BigUint, AsmError> {
    match mac.ops.as_slice() {
        [op] => match &op.kind {
            OpKind::Push { data, .. } => Ok(BigUint::from_bytes_be(data)),
            OpKind::CodeSize { name, args } => {
                Ok(BigUint::from(ctx.code_size(name, args, &op.origin)?))
            }
            _ => Err(literal_error("macro is not a literal", &mac.name, origin)),
        },
        _ => Err(literal_error("macro is not a literal", &mac.name, origin)),
    }
}

fn literal_error(msg: &str, text: &str, origin: &SourceOrigin) -> AsmError {
    AsmError::new(AsmErrorKind::Parse, msg, Some(text)).with_origin(origin)
}

/// `<inner>` when the outer brackets enclose the whole text.
fn strip_template_brackets(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('<')?.strip_suffix('>')?;
    let mut depth = 0i32;
    for c in inner.chars() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {}
        }
    }
    (depth == 0).then_some(inner)
}

fn split_top_level(text: &str, op: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (idx, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if c == op && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

struct ModifiedOpcode<'a> {
    family: &'a str,
    base: &'a str,
    op: char,
    offset: &'a str,
}

fn split_modified_opcode(text: &str) -> Option<ModifiedOpcode<'_>> {
    let compact = text.trim();
    let (family, rest) = if let Some(rest) = compact.strip_prefix("dup") {
        ("dup", rest)
    } else if let Some(rest) = compact.strip_prefix("swap") {
        ("swap", rest)
    } else {
        return None;
    };
    let op_idx = rest.find(['+', '-'])?;
    let base = rest[..op_idx].trim();
    let op = rest[op_idx..].chars().next()?;
    let offset = rest[op_idx + 1..].trim();
    if parse_number(base).is_none() || parse_number(offset).is_none() {
        return None;
    }
    Some(ModifiedOpcode {
        family,
        base,
        op,
        offset,
    })
}

/// Matches `dup|swap N +|- M` with hex or decimal operands.
pub fn is_modified_opcode(text: &str) -> bool {
    split_modified_opcode(text).is_some()
}

/// Resolve a stack-opcode offset such as `swap16-0x05` to its opcode byte.
pub fn modified_opcode(text: &str, origin: &SourceOrigin) -> Result<u8, AsmError> {
    let Some(parts) = split_modified_opcode(text) else {
        return Err(literal_error("not a modified stack opcode", text, origin));
    };
    let base = parse_number(parts.base).unwrap_or_default();
    let offset = parse_number(parts.offset).unwrap_or_default();
    let position = match parts.op {
        '+' => Some(base + offset),
        _ => base.checked_sub(&offset),
    };
    let in_range = position
        .as_ref()
        .and_then(ToPrimitive::to_u32)
        .filter(|value| (1..=16).contains(value));
    let Some(position) = in_range else {
        let shown = match position {
            Some(value) => value.to_string(),
            None => "negative".to_string(),
        };
        return Err(AsmError::new(
            AsmErrorKind::ArithmeticRange,
            &format!(
                "result of {}{}{} is {shown} but must be between 1 and 16 inclusive",
                parts.base, parts.op, parts.offset
            ),
            None,
        )
        .with_origin(origin));
    };
    opcode_for(&format!("{}{position}", parts.family)).ok_or_else(|| {
        literal_error("unknown stack opcode", &format!("{}{position}", parts.family), origin)
    })
}
