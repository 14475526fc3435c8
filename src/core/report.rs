// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Shared reporting helpers used by diagnostics rendering.

/// Highlight the token starting at the 1-based `column` of `line`.
///
/// The highlighted span runs to the next whitespace. Without colour the line
/// is returned unchanged.
pub fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    let Some(start) = column.filter(|col| *col > 0).map(|col| col - 1) else {
        return line.to_string();
    };
    if !use_color || start >= line.len() || !line.is_char_boundary(start) {
        return line.to_string();
    }
    let (head, tail) = line.split_at(start);
    let len = tail.find(char::is_whitespace).unwrap_or(tail.len());
    let (token, rest) = tail.split_at(len);
    format!("{head}\x1b[31m{token}\x1b[0m{rest}")
}
