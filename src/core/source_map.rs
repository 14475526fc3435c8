// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Source map support for mapping flattened source offsets and emitted bytes
//! back to their origin files.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrigin {
    pub file: String,
    pub line: u32,
    pub text: String,
}

impl SourceOrigin {
    pub fn new(file: impl Into<String>, line: u32, text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            text: text.into(),
        }
    }
}

impl fmt::Display for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One input file after comment blanking and include removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct FileSpan {
    name: String,
    start: usize,
    text: String,
}

/// Maps byte offsets in the flattened buffer to file, line and line text.
#[derive(Debug, Clone, Default)]
pub struct InputMap {
    files: Vec<FileSpan>,
    flattened: String,
}

impl InputMap {
    pub fn new(files: Vec<SourceFile>) -> Self {
        let mut spans = Vec::with_capacity(files.len());
        let mut flattened = String::new();
        for file in files {
            spans.push(FileSpan {
                name: file.name,
                start: flattened.len(),
                text: file.text.clone(),
            });
            flattened.push_str(&file.text);
        }
        Self {
            files: spans,
            flattened,
        }
    }

    /// The concatenated text the declaration parser scans.
    pub fn flattened(&self) -> &str {
        &self.flattened
    }

    pub fn origin_at(&self, offset: usize) -> SourceOrigin {
        let Some(file) = self
            .files
            .iter()
            .rev()
            .find(|file| file.start <= offset && !file.text.is_empty())
            .or_else(|| self.files.first())
        else {
            return SourceOrigin::new("<unknown>", 0, "");
        };
        let local = offset.saturating_sub(file.start).min(file.text.len());
        let before = &file.text[..floor_char_boundary(&file.text, local)];
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
        let line_text = file.text[line_start..].split('\n').next().unwrap_or("");
        SourceOrigin::new(
            file.name.clone(),
            line,
            line_text.trim_end_matches('\r'),
        )
    }
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
