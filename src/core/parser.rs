// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Top-level declaration parser and the macro/table symbol tables.
//!
//! One left-to-right scan over the flattened source collects macros
//! (optionally preceded by a template parameter list), jump tables, packed
//! jump tables, and code tables.

use std::collections::HashMap;
use std::rc::Rc;

use num_traits::ToPrimitive;

use crate::core::assembler::error::{AsmError, AsmErrorKind};
use crate::core::expr::{minimal_bytes, parse_number};
use crate::core::opcodes::MAX_PUSH_WIDTH;
use crate::core::source_map::{InputMap, SourceOrigin};
use crate::core::text_utils::{
    conforms_to_name_rules, hex_to_bytes, is_ident, split_commas, Cursor,
};
use crate::core::tokenizer::{tokenize_body, Op};

/// Encoded width of one unpacked jump-table entry.
pub const UNPACKED_ENTRY_WIDTH: usize = MAX_PUSH_WIDTH;
/// Encoded width of one packed jump-table entry.
pub const PACKED_ENTRY_WIDTH: usize = 2;

#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub takes: usize,
    pub returns: usize,
    pub template_params: Vec<String>,
    pub ops: Vec<Op>,
    /// Raw body text as written between the braces.
    pub body: String,
    pub origin: SourceOrigin,
}

/// Macros by name. Synthetic template macros are added during expansion.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: HashMap<String, Rc<Macro>>,
}

impl MacroTable {
    pub fn get(&self, name: &str) -> Option<Rc<Macro>> {
        self.macros.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn insert(&mut self, mac: Macro) -> Result<(), AsmError> {
        if self.macros.contains_key(&mac.name) {
            return Err(
                AsmError::new(AsmErrorKind::Name, "duplicate macro", Some(&mac.name))
                    .with_origin(&mac.origin),
            );
        }
        self.macros.insert(mac.name.clone(), Rc::new(mac));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableBody {
    Jumps { labels: Vec<String>, packed: bool },
    Code(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct JumpTable {
    pub name: String,
    pub body: TableBody,
    pub origin: SourceOrigin,
}

impl JumpTable {
    /// Payload size in bytes once linked.
    pub fn size(&self) -> usize {
        match &self.body {
            TableBody::Jumps { labels, packed } => labels.len() * entry_width(*packed),
            TableBody::Code(bytes) => bytes.len(),
        }
    }
}

pub fn entry_width(packed: bool) -> usize {
    if packed {
        PACKED_ENTRY_WIDTH
    } else {
        UNPACKED_ENTRY_WIDTH
    }
}

/// Tables in declaration order, which is also their link order.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: Vec<JumpTable>,
    index: HashMap<String, usize>,
}

impl TableSet {
    pub fn get(&self, name: &str) -> Option<&JumpTable> {
        self.index.get(name).map(|idx| &self.tables[*idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &JumpTable> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn insert(&mut self, table: JumpTable) -> Result<(), AsmError> {
        if self.index.contains_key(&table.name) {
            return Err(
                AsmError::new(AsmErrorKind::Name, "duplicate table", Some(&table.name))
                    .with_origin(&table.origin),
            );
        }
        self.index.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub macros: MacroTable,
    pub tables: TableSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Macro,
    JumpTable,
    PackedJumpTable,
    CodeTable,
}

impl DeclKind {
    fn describe(self) -> &'static str {
        match self {
            Self::Macro => "macro",
            Self::JumpTable => "jumptable",
            Self::PackedJumpTable => "packed jumptable",
            Self::CodeTable => "bytecode table",
        }
    }
}

struct DeclParser<'a> {
    cursor: Cursor<'a>,
    map: &'a InputMap,
    pending_template: Option<(Vec<String>, SourceOrigin)>,
    decls: Declarations,
}

/// Scan the flattened source in `map` for declarations.
pub fn parse_declarations(map: &InputMap) -> Result<Declarations, AsmError> {
    let mut parser = DeclParser {
        cursor: Cursor::new(map.flattened()),
        map,
        pending_template: None,
        decls: Declarations::default(),
    };
    parser.run()?;
    Ok(parser.decls)
}

impl<'a> DeclParser<'a> {
    fn origin(&self, pos: usize) -> SourceOrigin {
        self.map.origin_at(pos)
    }

    fn error_at(&self, kind: AsmErrorKind, msg: &str, param: Option<&str>, pos: usize) -> AsmError {
        AsmError::new(kind, msg, param).with_origin(&self.origin(pos))
    }

    fn run(&mut self) -> Result<(), AsmError> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.is_eof() {
                break;
            }
            let start = self.cursor.pos();
            if self.cursor.eat_keyword("#include") {
                return Err(self.error_at(
                    AsmErrorKind::Parse,
                    "#include statements must come before any other declarations",
                    None,
                    start,
                ));
            }
            if self.take_template_params(start)? {
                continue;
            }
            let kind = self.take_decl_keyword();
            match kind {
                Some(kind) => {
                    if kind != DeclKind::Macro && self.pending_template.is_some() {
                        return Err(self.error_at(
                            AsmErrorKind::Parse,
                            "template parameters must be followed by a macro declaration",
                            None,
                            start,
                        ));
                    }
                    self.parse_declaration(kind, start)?;
                }
                None => {
                    let origin = self.origin(start);
                    return Err(AsmError::new(
                        AsmErrorKind::Parse,
                        &format!("could not process line {} in {}", origin.line, origin.file),
                        Some(origin.text.trim()),
                    )
                    .with_origin(&origin));
                }
            }
        }
        match self.pending_template.take() {
            Some((_, origin)) => Err(AsmError::new(
                AsmErrorKind::Parse,
                "template parameters must be followed by a macro declaration",
                None,
            )
            .with_origin(&origin)),
            None => Ok(()),
        }
    }

    /// `template <a, b>` or `<a, b>`.
    fn take_template_params(&mut self, start: usize) -> Result<bool, AsmError> {
        if self.cursor.eat_keyword("template") {
            self.cursor.skip_whitespace();
        }
        if self.cursor.peek() != Some('<') {
            self.cursor.set_pos(start);
            return Ok(false);
        }
        if self.pending_template.is_some() {
            return Err(self.error_at(
                AsmErrorKind::Parse,
                "template parameters must be followed by a macro declaration",
                None,
                start,
            ));
        }
        let Some(inner) = self.cursor.take_balanced('<', '>') else {
            return Err(self.error_at(
                AsmErrorKind::Parse,
                "unterminated template parameter list",
                None,
                start,
            ));
        };
        let params = split_commas(inner);
        if let Some(bad) = params.iter().find(|param| !is_ident(param)) {
            return Err(self.error_at(
                AsmErrorKind::Parse,
                "invalid template parameter",
                Some(bad.as_str()),
                start,
            ));
        }
        self.pending_template = Some((params, self.origin(start)));
        Ok(true)
    }

    fn take_decl_keyword(&mut self) -> Option<DeclKind> {
        let start = self.cursor.pos();
        let had_define = self.cursor.eat_keyword("#define");
        if had_define {
            self.cursor.skip_whitespace();
        }
        let kind = if had_define && self.cursor.eat_keyword("macro") {
            Some(DeclKind::Macro)
        } else if self.cursor.eat_keyword("jumptable__packed") {
            Some(DeclKind::PackedJumpTable)
        } else if self.cursor.eat_keyword("jumptable") {
            Some(DeclKind::JumpTable)
        } else if self.cursor.eat_keyword("table") {
            Some(DeclKind::CodeTable)
        } else {
            None
        };
        if kind.is_none() {
            self.cursor.set_pos(start);
        }
        kind
    }

    fn take_name(&mut self, kind: DeclKind, start: usize) -> Result<String, AsmError> {
        self.cursor.skip_whitespace();
        let Some(name) = self.cursor.take_ident() else {
            return Err(self.error_at(
                AsmErrorKind::Parse,
                &format!("expected {} name", kind.describe()),
                None,
                start,
            ));
        };
        if !conforms_to_name_rules(name) {
            return Err(self.error_at(
                AsmErrorKind::Name,
                &format!(
                    "{} '{name}' does not conform to naming rules; names must contain at least \
                     one letter and must not start with '0x'",
                    kind.describe()
                ),
                None,
                start,
            ));
        }
        Ok(name.to_string())
    }

    fn expect_char(&mut self, expected: char, what: &str, start: usize) -> Result<(), AsmError> {
        self.cursor.skip_whitespace();
        if self.cursor.eat_char(expected) {
            Ok(())
        } else {
            Err(self.error_at(
                AsmErrorKind::Parse,
                &format!("expected '{expected}' {what}"),
                Some(self.cursor.current_line_rest().trim()),
                start,
            ))
        }
    }

    /// `keyword(n)` with a decimal or hex count.
    fn take_count(&mut self, keyword: &str, start: usize) -> Result<usize, AsmError> {
        self.cursor.skip_whitespace();
        if !self.cursor.eat_keyword(keyword) {
            return Err(self.error_at(
                AsmErrorKind::Parse,
                &format!("expected {keyword}(n) in macro declaration"),
                None,
                start,
            ));
        }
        self.cursor.skip_whitespace();
        let inner = self.cursor.take_balanced('(', ')').unwrap_or("");
        parse_count(inner).ok_or_else(|| {
            self.error_at(
                AsmErrorKind::Parse,
                &format!("invalid {keyword} count"),
                Some(inner.trim()),
                start,
            )
        })
    }

    /// Returns the body text and its byte offset in the flattened source.
    fn take_body(&mut self, name: &str, start: usize) -> Result<(&'a str, usize), AsmError> {
        self.expect_char('{', "to open the body", start)?;
        let body_start = self.cursor.pos();
        match self.cursor.take_until('}') {
            Some(body) => Ok((body, body_start)),
            None => Err(self.error_at(
                AsmErrorKind::Parse,
                "unterminated body for",
                Some(name),
                start,
            )),
        }
    }

    fn parse_declaration(&mut self, kind: DeclKind, start: usize) -> Result<(), AsmError> {
        let name = self.take_name(kind, start)?;
        match kind {
            DeclKind::Macro => self.parse_macro(name, start),
            DeclKind::JumpTable | DeclKind::PackedJumpTable => {
                let (body, _) = self.take_body(&name, start)?;
                let mut labels = Vec::new();
                for label in body.split_whitespace() {
                    if !is_ident(label) {
                        return Err(self.error_at(
                            AsmErrorKind::Parse,
                            &format!("invalid label in jumptable '{name}'"),
                            Some(label),
                            start,
                        ));
                    }
                    labels.push(label.to_string());
                }
                let table = JumpTable {
                    name,
                    body: TableBody::Jumps {
                        labels,
                        packed: kind == DeclKind::PackedJumpTable,
                    },
                    origin: self.origin(start),
                };
                self.decls.tables.insert(table)
            }
            DeclKind::CodeTable => {
                let (body, body_start) = self.take_body(&name, start)?;
                let bytes = parse_code_table(body).map_err(|(offset, token)| {
                    self.error_at(
                        AsmErrorKind::Parse,
                        &format!(
                            "unexpected token in bytecode table '{name}'; entries must be \
                             decimal or hexadecimal literals"
                        ),
                        Some(token),
                        body_start + offset,
                    )
                })?;
                let table = JumpTable {
                    name,
                    body: TableBody::Code(bytes),
                    origin: self.origin(start),
                };
                self.decls.tables.insert(table)
            }
        }
    }

    fn parse_macro(&mut self, name: String, start: usize) -> Result<(), AsmError> {
        if self.cursor.peek() == Some('(') {
            let inner = self.cursor.take_balanced('(', ')').unwrap_or("");
            if !inner.trim().is_empty() && parse_count(inner).is_none() {
                return Err(self.error_at(
                    AsmErrorKind::Parse,
                    "invalid parameter count for macro",
                    Some(&name),
                    start,
                ));
            }
        }
        self.expect_char('=', "after macro name", start)?;
        let takes = self.take_count("takes", start)?;
        let returns = self.take_count("returns", start)?;
        let (body, body_start) = self.take_body(&name, start)?;
        let ops = tokenize_body(body, body_start, &self.decls.tables, self.map)?;
        let template_params = self
            .pending_template
            .take()
            .map(|(params, _)| params)
            .unwrap_or_default();
        self.decls.macros.insert(Macro {
            name,
            takes,
            returns,
            template_params,
            ops,
            body: body.to_string(),
            origin: self.origin(start),
        })
    }
}

fn parse_count(text: &str) -> Option<usize> {
    parse_number(text.trim())?.to_usize()
}

/// Concatenate the literal tokens of a code table. On failure returns the
/// offending token and its offset within the body.
pub fn parse_code_table(body: &str) -> Result<Vec<u8>, (usize, &str)> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(body);
    loop {
        cursor.skip_whitespace();
        if cursor.is_eof() {
            return Ok(bytes);
        }
        let offset = cursor.pos();
        let token = cursor.take_while(|c| !c.is_whitespace());
        let encoded = match token.strip_prefix("0x") {
            Some(digits) => hex_to_bytes(digits),
            None => parse_number(token).map(|value| minimal_bytes(&value)),
        };
        match encoded {
            Some(encoded) => bytes.extend(encoded),
            None => return Err((offset, token)),
        }
    }
}
