// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Small scanning helpers shared by the declaration parser and body tokenizer.

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub fn is_ident(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_ident_char)
}

/// True when the text holds nothing but whitespace.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// Declaration names need at least one letter and must not read as hex.
pub fn conforms_to_name_rules(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_alphabetic()) && !name.starts_with("0x")
}

/// Split on commas, trimming each part. Empty input yields no parts.
pub fn split_commas(text: &str) -> Vec<String> {
    if is_blank(text) {
        return Vec::new();
    }
    text.split(',').map(|part| part.trim().to_string()).collect()
}

/// Split on commas that are not nested inside `<...>` groups.
pub fn split_commas_ignoring_templates(text: &str) -> Vec<String> {
    if is_blank(text) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    out.push(current.trim().to_string());
    out
}

/// Replace whole identifier words in one pass. Replacement text is never
/// rescanned, so a bound value that spells another parameter stays intact.
pub fn replace_words<'a>(text: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start: Option<usize> = None;
    for (idx, c) in text.char_indices() {
        if is_ident_char(c) {
            if word_start.is_none() {
                word_start = Some(idx);
            }
            continue;
        }
        if let Some(start) = word_start.take() {
            push_word(&mut out, &text[start..idx], &lookup);
        }
        out.push(c);
    }
    if let Some(start) = word_start {
        push_word(&mut out, &text[start..], &lookup);
    }
    out
}

fn push_word<'a>(out: &mut String, word: &str, lookup: &impl Fn(&str) -> Option<&'a str>) {
    match lookup(word) {
        Some(value) => out.push_str(value),
        None => out.push_str(word),
    }
}

/// Lower-case hex rendering of a byte slice.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Decode hex digits into bytes, left-padding odd-length input with a zero.
pub fn hex_to_bytes(digits: &str) -> Option<Vec<u8>> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    (0..padded.len())
        .step_by(2)
        .map(|idx| u8::from_str_radix(&padded[idx..idx + 2], 16).ok())
        .collect()
}

/// Byte cursor over a source slice. Positions are byte offsets into the slice.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.text.len());
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        self.take_while(char::is_whitespace);
        self.pos - start
    }

    pub fn eat_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn eat_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    /// Consume `keyword` only when it is not the prefix of a longer word.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        if !rest.starts_with(keyword) {
            return false;
        }
        if rest[keyword.len()..].chars().next().is_some_and(is_ident_char) {
            return false;
        }
        self.pos += keyword.len();
        true
    }

    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(_, c)| !pred(*c))
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    pub fn take_ident(&mut self) -> Option<&'a str> {
        let word = self.take_while(is_ident_char);
        if word.is_empty() {
            None
        } else {
            Some(word)
        }
    }

    /// With the cursor on `open`, consume through the matching `close` and
    /// return the text between them.
    pub fn take_balanced(&mut self, open: char, close: char) -> Option<&'a str> {
        let rest = self.rest();
        if !rest.starts_with(open) {
            return None;
        }
        let mut depth = 0usize;
        for (idx, c) in rest.char_indices() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    self.pos += idx + close.len_utf8();
                    return Some(&rest[open.len_utf8()..idx]);
                }
            }
        }
        None
    }

    /// Consume through the next `terminator`, returning the text before it.
    pub fn take_until(&mut self, terminator: char) -> Option<&'a str> {
        let rest = self.rest();
        let idx = rest.find(terminator)?;
        self.pos += idx + terminator.len_utf8();
        Some(&rest[..idx])
    }

    /// Text up to the end of the current line, for error messages.
    pub fn current_line_rest(&self) -> &'a str {
        let rest = self.rest();
        rest.split('\n').next().unwrap_or(rest)
    }
}
