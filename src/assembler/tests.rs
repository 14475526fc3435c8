// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::cli::{validate_cli, with_env_vars, Cli};
use super::output::build_sourcemap_payload;
use super::{
    compile_file, compile_source, run_with_cli, run_with_config, CompileOptions,
    INLINE_SOURCE_NAME,
};
use crate::core::assembler::error::{AsmErrorKind, Severity};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

fn create_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join(format!("test-{label}-{}-{nanos}", process::id()));
    fs::create_dir_all(&dir).expect("Create temp dir");
    dir
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Create parent dir");
    }
    fs::write(path, contents).expect("Write test file");
}

fn compile_main(body: &str) -> super::CompileReport {
    let source = format!("#define macro MAIN() = takes(0) returns(0) {{ {body} }}");
    compile_source(&source, "MAIN").expect("compile")
}

#[test]
fn push_push_add_scenario() {
    let report = compile_source(
        "#define macro MAIN() = takes(0) returns(0) { 0x01 0x02 add }",
        "MAIN",
    )
    .expect("compile");
    assert_eq!(report.bytecode(), "6001600201");
    assert_eq!(report.bytes(), &[0x60, 0x01, 0x60, 0x02, 0x01]);
    assert_eq!(report.sourcemap().len(), 5);
    assert!(report
        .sourcemap()
        .iter()
        .all(|origin| origin.file == INLINE_SOURCE_NAME && origin.line == 1));
    assert!(report.diagnostics().is_empty());
}

#[test]
fn label_named_like_an_opcode_resolves_to_its_definition() {
    let report = compile_main("jump: dup1 jump");
    // jumpdest | dup1 | push2 0000
    assert_eq!(report.bytecode(), "5b80610000");
    assert_eq!(report.jump_labels(), &[("jump".to_string(), 0)]);
}

#[test]
fn duplicate_label_is_name_error() {
    let err = compile_source(
        "#define macro MAIN() = takes(0) returns(0) { a: 0x01 a: stop }",
        "MAIN",
    )
    .expect_err("duplicate label");
    assert_eq!(err.kind(), AsmErrorKind::Name);
    assert_eq!(err.diagnostics().len(), 1);
}

#[test]
fn labels_defined_by_the_caller_patch_every_reference() {
    let source = "\
#define macro CHECK = takes(1) returns(0) { done jumpi }
#define macro MAIN = takes(0) returns(0) {
    CHECK()
    CHECK()
    done:
    stop
}";
    let report = compile_source(source, "MAIN").expect("compile");
    // two copies of push2 0008 jumpi, then jumpdest stop
    assert_eq!(report.bytecode(), "61000857610008575b00");
    assert_eq!(report.jump_labels(), &[("done".to_string(), 8)]);
    assert_eq!(report.sourcemap()[0].line, 1);
    assert_eq!(report.sourcemap()[8].line, 5);
}

#[test]
fn unmatched_labels_are_reported_together() {
    let source = "#define macro MAIN = takes(0) returns(0) {\n    nowhere\n    elsewhere jump\n}";
    let err = compile_source(source, "MAIN").expect_err("unmatched");
    assert_eq!(err.kind(), AsmErrorKind::UnmatchedJump);
    assert!(err.to_string().contains("nowhere, elsewhere"));
    let lines: Vec<u32> = err.diagnostics().iter().map(|diag| diag.line()).collect();
    assert_eq!(lines, vec![2, 3]);
    assert!(err
        .diagnostics()
        .iter()
        .all(|diag| diag.code() == "sfj001" && !diag.help().is_empty()));
}

#[test]
fn templates_codesize_and_modified_opcodes() {
    let source = "\
template <value>
#define macro PUT = takes(0) returns(0) { <value> }
#define macro BODY = takes(0) returns(0) { 0x01 0x02 add }
#define macro MAIN = takes(0) returns(0) {
    PUT<0x10>()
    PUT<dup1+15>()
    __codesize(BODY)
    PUT<BODY>()
}";
    let report = compile_source(source, "MAIN").expect("compile");
    assert_eq!(report.bytecode(), "60108f60056001600201");
}

#[test]
fn modified_opcode_boundaries() {
    let source = |arg: &str| {
        format!(
            "template <v>\n#define macro PUT = takes(0) returns(0) {{ <v> }}\n\
             #define macro MAIN = takes(0) returns(0) {{ PUT<{arg}>() }}"
        )
    };
    assert_eq!(
        compile_source(&source("swap1+15"), "MAIN").expect("swap16").bytecode(),
        "9f"
    );
    assert_eq!(
        compile_source(&source("dup2-1"), "MAIN").expect("dup1").bytecode(),
        "80"
    );
    let err = compile_source(&source("dup1-1"), "MAIN").expect_err("dup0");
    assert_eq!(err.kind(), AsmErrorKind::ArithmeticRange);
    let err = compile_source(&source("dup16+1"), "MAIN").expect_err("dup17");
    assert_eq!(err.kind(), AsmErrorKind::ArithmeticRange);
}

#[test]
fn recursion_is_caught_with_the_cycle() {
    let source = "\
#define macro A = takes(0) returns(0) { B() }
#define macro B = takes(0) returns(0) { A() }
#define macro MAIN = takes(0) returns(0) { A() }";
    let err = compile_source(source, "MAIN").expect_err("cycle");
    assert_eq!(err.kind(), AsmErrorKind::Recursion);
    assert!(err.to_string().contains("A -> B -> A"));
}

#[test]
fn max_depth_bounds_nesting() {
    let dir = create_temp_dir("max-depth");
    let path = dir.join("deep.sf");
    write_file(
        &path,
        "#define macro C = takes(0) returns(0) { stop }\n\
         #define macro B = takes(0) returns(0) { C() }\n\
         #define macro MAIN = takes(0) returns(0) { B() }\n",
    );
    let shallow = CompileOptions {
        max_depth: 2,
        ..CompileOptions::default()
    };
    let err = compile_file(&path, "MAIN", &shallow).expect_err("too deep");
    assert_eq!(err.kind(), AsmErrorKind::Recursion);
    let enough = CompileOptions {
        max_depth: 3,
        ..CompileOptions::default()
    };
    assert_eq!(
        compile_file(&path, "MAIN", &enough).expect("fits").bytecode(),
        "00"
    );
}

#[test]
fn tables_follow_the_program_at_the_starting_offset() {
    let dir = create_temp_dir("tables");
    let path = dir.join("tables.sf");
    write_file(
        &path,
        "#define jumptable__packed DISPATCH { first second }\n\
         #define macro MAIN = takes(0) returns(0) {\n\
         \x20   __tablestart(DISPATCH) __tablesize(DISPATCH) codecopy\n\
         \x20   first: stop\n\
         \x20   second: stop\n\
         }\n",
    );
    let options = CompileOptions {
        starting_offset: 0x10,
        ..CompileOptions::default()
    };
    let report = compile_file(&path, "MAIN", &options).expect("compile");
    // push2 001b | push1 04 | codecopy | 5b 00 | 5b 00 | 00 | 0016 0018
    assert_eq!(report.bytecode(), "61001b6004395b005b000000160018");
    assert_eq!(report.table_offsets(), &[("DISPATCH".to_string(), 0x1b)]);
    assert_eq!(
        report.jump_labels(),
        &[("first".to_string(), 0x16), ("second".to_string(), 0x18)]
    );
    assert_eq!(report.sourcemap().len(), report.bytes().len());
    assert_eq!(report.sourcemap()[report.bytes().len() - 1].line, 1);
}

#[test]
fn unresolved_table_entry_is_a_report_warning() {
    let source = "\
jumptable__packed JT { here gone }
#define macro MAIN = takes(0) returns(0) { here: stop }";
    let report = compile_source(source, "MAIN").expect("compile");
    assert_eq!(report.bytecode(), "5b000000000000");
    assert_eq!(report.diagnostics().len(), 1);
    let warning = &report.diagnostics()[0];
    assert_eq!(warning.severity(), Severity::Warning);
    assert!(warning.message().contains("gone"));
    assert!(warning.message().contains("JT"));
}

#[test]
fn compiling_twice_is_identical() {
    let source = "\
template <v>
#define macro PUT = takes(0) returns(0) { <v> }
#define macro MAIN = takes(0) returns(0) { PUT<0x01>() PUT<lbl>() lbl: stop }";
    let first = compile_source(source, "MAIN").expect("first");
    let second = compile_source(source, "MAIN").expect("second");
    assert_eq!(first.bytecode(), second.bytecode());
    assert_eq!(first.sourcemap(), second.sourcemap());
    assert_eq!(first.bytecode(), "60016100055b00");
}

#[test]
fn comments_are_ignored_and_lines_kept() {
    let source = "// leading comment\n\
                  /* block\n   comment */\n\
                  #define macro MAIN = takes(0) returns(0) {\n\
                  \x20   0x01 // one\n\
                  \x20   pop /* drop it */\n\
                  }";
    let report = compile_source(source, "MAIN").expect("compile");
    assert_eq!(report.bytecode(), "600150");
    assert_eq!(report.sourcemap()[0].line, 5);
    assert_eq!(report.sourcemap()[2].line, 6);
}

#[test]
fn inline_source_rejects_include() {
    let err = compile_source("#include \"lib.sf\"\n", "MAIN").expect_err("include");
    assert_eq!(err.kind(), AsmErrorKind::Preprocess);
}

#[test]
fn unknown_root_macro_is_name_error() {
    let err = compile_source("#define macro A = takes(0) returns(0) { }", "MAIN")
        .expect_err("no MAIN");
    assert_eq!(err.kind(), AsmErrorKind::Name);
}

#[test]
fn includes_resolve_relative_then_include_roots() {
    let dir = create_temp_dir("includes");
    let root = dir.join("src").join("main.sf");
    write_file(
        &root,
        "#include \"local.sf\"\n#include \"shared.sf\"\n\
         #define macro MAIN = takes(0) returns(0) { LOCAL() SHARED() }\n",
    );
    write_file(
        &dir.join("src").join("local.sf"),
        "#define macro LOCAL = takes(0) returns(0) { 0x01 }\n",
    );
    write_file(
        &dir.join("inc_a").join("shared.sf"),
        "#define macro SHARED = takes(0) returns(0) { 0x0a }\n",
    );
    write_file(
        &dir.join("inc_b").join("shared.sf"),
        "#define macro SHARED = takes(0) returns(0) { 0x0b }\n",
    );

    let a_first = CompileOptions {
        include_paths: vec![dir.join("inc_a"), dir.join("inc_b")],
        ..CompileOptions::default()
    };
    let report = compile_file(&root, "MAIN", &a_first).expect("compile a first");
    assert_eq!(report.bytecode(), "6001600a");
    assert!(report.sourcemap()[0].file.ends_with("local.sf"));
    assert!(report.sourcemap()[2].file.ends_with("shared.sf"));

    let b_first = CompileOptions {
        include_paths: vec![dir.join("inc_b"), dir.join("inc_a")],
        ..CompileOptions::default()
    };
    let report = compile_file(&root, "MAIN", &b_first).expect("compile b first");
    assert_eq!(report.bytecode(), "6001600b");
}

#[test]
fn repeated_include_is_skipped_with_warning() {
    let dir = create_temp_dir("include-twice");
    let root = dir.join("main.sf");
    write_file(
        &root,
        "#include \"a.sf\"\n#include \"b.sf\"\n\
         #define macro MAIN = takes(0) returns(0) { A() B() }\n",
    );
    write_file(
        &dir.join("a.sf"),
        "#define macro A = takes(0) returns(0) { 0x01 }\n",
    );
    write_file(
        &dir.join("b.sf"),
        "#include \"a.sf\"\n#define macro B = takes(0) returns(0) { 0x02 }\n",
    );
    let report = compile_file(&root, "MAIN", &CompileOptions::default()).expect("compile");
    assert_eq!(report.bytecode(), "60016002");
    assert_eq!(report.diagnostics().len(), 1);
    let warning = &report.diagnostics()[0];
    assert_eq!(warning.severity(), Severity::Warning);
    assert_eq!(warning.code(), "sfx001");
    assert_eq!(warning.line(), 1);
    assert!(warning.file().is_some_and(|file| file.ends_with("b.sf")));
}

#[test]
fn missing_include_and_late_include_errors() {
    let dir = create_temp_dir("include-errors");
    let missing = dir.join("missing.sf");
    write_file(&missing, "#include \"nope.sf\"\n");
    let err = compile_file(&missing, "MAIN", &CompileOptions::default()).expect_err("missing");
    assert_eq!(err.kind(), AsmErrorKind::Io);
    assert!(err.to_string().contains("nope.sf"));

    let late = dir.join("late.sf");
    write_file(
        &late,
        "#define macro MAIN = takes(0) returns(0) { stop }\n#include \"x.sf\"\n",
    );
    let err = compile_file(&late, "MAIN", &CompileOptions::default()).expect_err("late");
    assert_eq!(err.kind(), AsmErrorKind::Parse);

    let err = compile_file(&dir.join("absent.sf"), "MAIN", &CompileOptions::default())
        .expect_err("absent root");
    assert_eq!(err.kind(), AsmErrorKind::Io);
}

#[test]
fn sourcemap_payload_lists_every_byte() {
    let report = compile_source(
        "#define macro MAIN() = takes(2) returns(1) { 0x01 stop }",
        "MAIN",
    )
    .expect("compile");
    let payload = build_sourcemap_payload(&report);
    assert_eq!(payload["macro"], "MAIN");
    assert_eq!(payload["takes"], 2);
    assert_eq!(payload["returns"], 1);
    assert_eq!(payload["bytecode"], "600100");
    let entries = payload["sourcemap"].as_array().expect("entries");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2]["offset"], 2);
    assert_eq!(entries[2]["file"], INLINE_SOURCE_NAME);
    assert_eq!(entries[2]["line"], 1);
}

#[test]
fn run_with_cli_writes_requested_outputs() {
    let dir = create_temp_dir("cli-outputs");
    let input = dir.join("prog.sf");
    let hex = dir.join("prog.hex");
    let bin = dir.join("prog.bin");
    let map = dir.join("prog.map.json");
    write_file(
        &input,
        "#define macro ENTRY = takes(0) returns(0) { 0x2a dup1 }\n",
    );
    with_env_vars(&[], || {
        let cli = Cli::parse_from([
            "stackforge",
            input.to_string_lossy().as_ref(),
            "-m",
            "ENTRY",
            "-o",
            hex.to_string_lossy().as_ref(),
            "-b",
            bin.to_string_lossy().as_ref(),
            "-s",
            map.to_string_lossy().as_ref(),
        ]);
        let report = run_with_cli(&cli).expect("run");
        assert_eq!(report.bytecode(), "602a80");
    });
    assert_eq!(fs::read_to_string(&hex).expect("hex"), "602a80\n");
    assert_eq!(fs::read(&bin).expect("bin"), vec![0x60, 0x2a, 0x80]);
    let map_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&map).expect("map")).expect("json");
    assert_eq!(map_json["sourcemap"].as_array().map(Vec::len), Some(3));
}

#[test]
fn run_with_config_uses_the_validated_config_only() {
    let dir = create_temp_dir("validated-config");
    let input = dir.join("prog.sf");
    write_file(
        &input,
        "#define macro ENTRY = takes(0) returns(0) { 0x01 }\n\
         #define macro OTHER = takes(0) returns(0) { 0x02 }\n",
    );
    let config = with_env_vars(&[("STACKFORGE_MACRO", "ENTRY")], || {
        let cli = Cli::parse_from(["stackforge", input.to_string_lossy().as_ref()]);
        validate_cli(&cli).expect("validate cli")
    });
    with_env_vars(&[("STACKFORGE_MACRO", "OTHER")], || {
        let report = run_with_config(&config).expect("run");
        assert_eq!(report.macro_name(), "ENTRY");
        assert_eq!(report.bytecode(), "6001");
    });
}

#[test]
fn run_with_cli_werror_fails_when_warning_is_emitted() {
    let dir = create_temp_dir("werror-warning");
    let input = dir.join("warn.sf");
    let hex = dir.join("warn.hex");
    write_file(
        &input,
        "jumptable JT { missing }\n#define macro MAIN = takes(0) returns(0) { stop }\n",
    );
    with_env_vars(&[], || {
        let cli = Cli::parse_from([
            "stackforge",
            input.to_string_lossy().as_ref(),
            "-o",
            hex.to_string_lossy().as_ref(),
            "--Werror",
        ]);
        let err = run_with_cli(&cli).expect_err("warning promoted");
        assert!(err.to_string().contains("-Werror"));
        assert_eq!(err.diagnostics().len(), 1);
        assert_eq!(err.diagnostics()[0].severity(), Severity::Error);

        let cli = Cli::parse_from([
            "stackforge",
            input.to_string_lossy().as_ref(),
            "-o",
            hex.to_string_lossy().as_ref(),
        ]);
        let report = run_with_cli(&cli).expect("warning only");
        assert_eq!(report.diagnostics().len(), 1);
    });
    assert!(hex.exists());
}
