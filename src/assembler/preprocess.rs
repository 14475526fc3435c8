// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Source loading ahead of the declaration parser: comment blanking and
// resolution of each file's leading `#include` block.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::assembler::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::source_map::{SourceFile, SourceOrigin};
use crate::core::text_utils::Cursor;

/// Files in flattening order plus warnings raised while loading them.
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub files: Vec<SourceFile>,
    pub warnings: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IncludeDirective {
    target: String,
    origin: SourceOrigin,
}

/// Replace `// ...` and `/* ... */` comments with spaces. Newlines survive and
/// every byte keeps its offset.
pub fn blank_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                out.push_str("  ");
                chars.next();
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    push_blank(&mut out, next);
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                out.push_str("  ");
                chars.next();
                while let Some(next) = chars.next() {
                    if next == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        out.push_str("  ");
                        break;
                    }
                    push_blank(&mut out, next);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn push_blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat(' ').take(c.len_utf8()));
    }
}

/// Blank the leading `#include "..."` block of `text`, returning the cleaned
/// text and the directives in order.
fn take_include_block(
    name: &str,
    text: &str,
) -> Result<(String, Vec<IncludeDirective>), AsmError> {
    let mut cursor = Cursor::new(text);
    let mut directives = Vec::new();
    let mut spans = Vec::new();
    loop {
        cursor.skip_whitespace();
        let start = cursor.pos();
        if !cursor.eat_keyword("#include") {
            break;
        }
        let origin = origin_in(name, text, start);
        cursor.take_while(|c| c == ' ' || c == '\t');
        let target = if cursor.eat_char('"') {
            cursor.take_until('"').filter(|target| !target.contains('\n'))
        } else {
            None
        };
        let Some(target) = target.map(str::trim).filter(|target| !target.is_empty()) else {
            return Err(AsmError::new(
                AsmErrorKind::Preprocess,
                "malformed #include, expected a quoted path",
                Some(origin.text.trim()),
            )
            .with_origin(&origin));
        };
        directives.push(IncludeDirective {
            target: target.to_string(),
            origin,
        });
        spans.push(start..cursor.pos());
    }

    let mut cleaned = text.to_string();
    for span in spans {
        let blank = " ".repeat(span.len());
        cleaned.replace_range(span, &blank);
    }
    Ok((cleaned, directives))
}

fn origin_in(name: &str, text: &str, offset: usize) -> SourceOrigin {
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let line_text = text[line_start..].split('\n').next().unwrap_or("");
    SourceOrigin::new(name, line, line_text.trim_end_matches('\r'))
}

/// Prepare in-memory source, which has no directory to resolve includes
/// against.
pub fn prepare_inline_source(name: &str, source: &str) -> Result<SourceFile, AsmError> {
    let blanked = blank_comments(source);
    let (cleaned, directives) = take_include_block(name, &blanked)?;
    if let Some(directive) = directives.first() {
        return Err(AsmError::new(
            AsmErrorKind::Preprocess,
            "#include is not available for in-memory source",
            Some(&directive.target),
        )
        .with_origin(&directive.origin));
    }
    Ok(SourceFile::new(name, cleaned))
}

/// Load `root` and everything it includes. Included text precedes the
/// including file; a file is loaded at most once.
pub fn load_sources(
    root: &Path,
    include_paths: &[PathBuf],
    max_depth: usize,
) -> Result<LoadedSources, AsmError> {
    let mut loader = IncludeLoader {
        include_paths,
        max_depth,
        seen: HashSet::new(),
        loaded: LoadedSources::default(),
    };
    loader.seen.insert(canonical(root));
    loader.load(root, 0, None)?;
    Ok(loader.loaded)
}

struct IncludeLoader<'a> {
    include_paths: &'a [PathBuf],
    max_depth: usize,
    seen: HashSet<PathBuf>,
    loaded: LoadedSources,
}

impl IncludeLoader<'_> {
    fn load(
        &mut self,
        path: &Path,
        depth: usize,
        included_from: Option<&SourceOrigin>,
    ) -> Result<(), AsmError> {
        let name = path.to_string_lossy().to_string();
        if depth > self.max_depth {
            let err = AsmError::new(
                AsmErrorKind::Preprocess,
                &format!("include nesting deeper than {}", self.max_depth),
                Some(&name),
            );
            return Err(attach(err, included_from));
        }
        let text = fs::read_to_string(path).map_err(|io_err| {
            let err = AsmError::new(
                AsmErrorKind::Io,
                &format!("cannot read source file ({io_err})"),
                Some(&name),
            );
            attach(err, included_from)
        })?;

        let blanked = blank_comments(&text);
        let (cleaned, directives) = take_include_block(&name, &blanked)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        for directive in &directives {
            let resolved = self.resolve(base_dir, directive)?;
            if !self.seen.insert(canonical(&resolved)) {
                let warning = AsmError::new(
                    AsmErrorKind::Preprocess,
                    "file already included, skipping",
                    Some(&directive.target),
                )
                .with_origin(&directive.origin);
                self.loaded
                    .warnings
                    .push(Diagnostic::from_error(Severity::Warning, warning));
                continue;
            }
            self.load(&resolved, depth + 1, Some(&directive.origin))?;
        }
        self.loaded.files.push(SourceFile::new(name, cleaned));
        Ok(())
    }

    /// Relative to the including file first, then each include root in order.
    fn resolve(&self, base_dir: &Path, directive: &IncludeDirective) -> Result<PathBuf, AsmError> {
        let target = Path::new(&directive.target);
        if target.is_absolute() {
            if target.is_file() {
                return Ok(target.to_path_buf());
            }
        } else {
            let roots = self.include_paths.iter().map(PathBuf::as_path);
            for dir in std::iter::once(base_dir).chain(roots) {
                let candidate = dir.join(target);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(AsmError::new(
            AsmErrorKind::Io,
            "include file not found",
            Some(&directive.target),
        )
        .with_origin(&directive.origin))
    }
}

fn attach(err: AsmError, origin: Option<&SourceOrigin>) -> AsmError {
    match origin {
        Some(origin) => err.with_origin(origin),
        None => err,
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_become_spaces_with_offsets_kept() {
        let text = "0x01 // push one\n/* a\nb */ add";
        let blanked = blank_comments(text);
        assert_eq!(blanked.len(), text.len());
        assert_eq!(blanked, "0x01            \n    \n     add");
    }

    #[test]
    fn unterminated_block_comment_blanks_to_end() {
        assert_eq!(blank_comments("stop /* open"), "stop        ");
    }

    #[test]
    fn multibyte_comment_text_keeps_byte_length() {
        let text = "add // \u{e9}t\u{e9}\nstop";
        let blanked = blank_comments(text);
        assert_eq!(blanked.len(), text.len());
        assert!(blanked.ends_with("\nstop"));
    }

    #[test]
    fn include_block_is_blanked_and_collected() {
        let text = "#include \"a.sf\"\n  #include \"lib/b.sf\"\n#define macro M = takes(0) returns(0) {}";
        let (cleaned, directives) = take_include_block("main.sf", text).expect("include block");
        assert_eq!(cleaned.len(), text.len());
        assert!(cleaned.trim_start().starts_with("#define macro M"));
        let targets: Vec<&str> = directives.iter().map(|d| d.target.as_str()).collect();
        assert_eq!(targets, vec!["a.sf", "lib/b.sf"]);
        assert_eq!(directives[1].origin.line, 2);
    }

    #[test]
    fn include_after_declarations_is_left_for_the_parser() {
        let text = "#define macro M = takes(0) returns(0) {}\n#include \"late.sf\"";
        let (cleaned, directives) = take_include_block("main.sf", text).expect("include block");
        assert!(directives.is_empty());
        assert_eq!(cleaned, text);
    }

    #[test]
    fn malformed_include_is_preprocess_error() {
        let err = take_include_block("main.sf", "#include a.sf\n").expect_err("unquoted");
        assert_eq!(err.kind(), AsmErrorKind::Preprocess);
        assert_eq!(err.origin().map(|origin| origin.line), Some(1));
    }

    #[test]
    fn inline_source_rejects_includes() {
        let err = prepare_inline_source("<source>", "#include \"x.sf\"").expect_err("include");
        assert_eq!(err.kind(), AsmErrorKind::Preprocess);
        let file = prepare_inline_source("<source>", "stop // end").expect("plain source");
        assert_eq!(file.text, "stop       ");
    }
}
