use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

fn unique_temp_dir(label: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "stackforge-it-{label}-{}-{now}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_text(path: &Path, text: &str) {
    fs::write(path, text).expect("write file");
}

fn run_stackforge(args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_stackforge"));
    for key in [
        "STACKFORGE_MACRO",
        "STACKFORGE_INCLUDE_PATHS",
        "STACKFORGE_MAX_DEPTH",
        "STACKFORGE_QUIET",
        "STACKFORGE_NO_WARN",
        "STACKFORGE_WERROR",
        "STACKFORGE_ERROR_FILE",
    ] {
        command.env_remove(key);
    }
    command.env("NO_COLOR", "1");
    command.args(args).output().expect("run stackforge")
}

fn json_lines(text: &str) -> Vec<Value> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("json diagnostic"))
        .collect()
}

#[test]
fn prints_bytecode_to_stdout_by_default() {
    let dir = unique_temp_dir("stdout");
    let input = dir.join("add.sf");
    write_text(
        &input,
        "#define macro MAIN() = takes(0) returns(0) { 0x01 0x02 add }\n",
    );
    let output = run_stackforge(&[input.to_str().expect("utf8 path")]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "6001600201");
    assert!(output.stderr.is_empty());
}

#[test]
fn writes_hex_bin_and_sourcemap_files() {
    let dir = unique_temp_dir("files");
    let input = dir.join("prog.sf");
    let hex = dir.join("prog.hex");
    let bin = dir.join("prog.bin");
    let map = dir.join("prog.json");
    write_text(
        &input,
        "#define macro ENTRY = takes(0) returns(0) {\n    start: 0xff start jump\n}\n",
    );
    let output = run_stackforge(&[
        input.to_str().expect("utf8 path"),
        "--macro",
        "ENTRY",
        "--offset",
        "0x100",
        "-o",
        hex.to_str().expect("utf8 path"),
        "-b",
        bin.to_str().expect("utf8 path"),
        "-s",
        map.to_str().expect("utf8 path"),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());
    // jumpdest | push1 ff | push2 0100 | jump
    assert_eq!(fs::read_to_string(&hex).expect("hex").trim(), "5b60ff61010056");
    assert_eq!(fs::read(&bin).expect("bin").len(), 7);
    let map_json: Value =
        serde_json::from_str(&fs::read_to_string(&map).expect("map")).expect("map json");
    assert_eq!(map_json["macro"], "ENTRY");
    assert_eq!(map_json["sourcemap"][0]["offset"], 0x100);
    assert_eq!(map_json["sourcemap"][0]["line"], 2);
    assert_eq!(map_json["labels"][0]["name"], "start");
    assert_eq!(map_json["labels"][0]["offset"], 0x100);
}

#[test]
fn json_diagnostics_for_unmatched_labels() {
    let dir = unique_temp_dir("unmatched");
    let input = dir.join("bad.sf");
    write_text(
        &input,
        "#define macro MAIN = takes(0) returns(0) {\n    first\n    second\n}\n",
    );
    let output = run_stackforge(&[input.to_str().expect("utf8 path"), "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let diagnostics = json_lines(&String::from_utf8_lossy(&output.stderr));
    assert_eq!(diagnostics.len(), 2);
    for (diag, (label, line)) in diagnostics.iter().zip([("first", 2), ("second", 3)]) {
        assert_eq!(diag["code"], "sfj001");
        assert_eq!(diag["severity"], "error");
        assert_eq!(diag["line"], line);
        assert!(diag["message"].as_str().is_some_and(|msg| msg.contains(label)));
        assert!(diag["file"].as_str().is_some_and(|file| file.ends_with("bad.sf")));
    }
}

#[test]
fn text_diagnostics_show_source_context() {
    let dir = unique_temp_dir("text-diag");
    let input = dir.join("bad.sf");
    write_text(
        &input,
        "#define macro MAIN = takes(0) returns(0) {\n    MISSING()\n}\n",
    );
    let output = run_stackforge(&[input.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.sf:2: ERROR [sfn001]"), "stderr: {stderr}");
    assert!(stderr.contains("    2 |     MISSING()"), "stderr: {stderr}");
    assert!(stderr.contains("unknown macro: MISSING"), "stderr: {stderr}");
}

#[test]
fn warnings_routing_and_werror() {
    let dir = unique_temp_dir("warnings");
    let input = dir.join("warn.sf");
    let diag_log = dir.join("diag.log");
    write_text(
        &input,
        "jumptable__packed JT { absent }\n#define macro MAIN = takes(0) returns(0) { stop }\n",
    );

    let output = run_stackforge(&[
        input.to_str().expect("utf8 path"),
        "-E",
        diag_log.to_str().expect("utf8 path"),
    ]);
    assert!(output.status.success());
    // stop | separator | zero-filled entry
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "00000000");
    let logged = fs::read_to_string(&diag_log).expect("diag log");
    assert!(logged.contains("WARNING [sft001]"), "log: {logged}");
    assert!(logged.contains("note: 2 zero bytes at offset 0x2"), "log: {logged}");
    assert!(output.stderr.is_empty());

    let output = run_stackforge(&[input.to_str().expect("utf8 path"), "-w"]);
    assert!(output.status.success());
    assert!(output.stderr.is_empty());

    let output = run_stackforge(&[input.to_str().expect("utf8 path"), "--Werror"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR [sft001]"), "stderr: {stderr}");
    assert!(stderr.contains("-Werror"), "stderr: {stderr}");
}

#[test]
fn includes_and_include_roots() {
    let dir = unique_temp_dir("includes");
    let lib = dir.join("lib");
    fs::create_dir_all(&lib).expect("create lib dir");
    let input = dir.join("main.sf");
    write_text(
        &input,
        "#include \"consts.sf\"\n#define macro MAIN = takes(0) returns(0) { FIVE() }\n",
    );
    write_text(
        &lib.join("consts.sf"),
        "// shared constants\n#define macro FIVE = takes(0) returns(0) { 0x05 }\n",
    );

    let output = run_stackforge(&[input.to_str().expect("utf8 path")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("sfi001"));

    let output = run_stackforge(&[
        input.to_str().expect("utf8 path"),
        "-I",
        lib.to_str().expect("utf8 path"),
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "6005");
}

#[test]
fn invalid_cli_values_fail_fast() {
    let dir = unique_temp_dir("bad-cli");
    let input = dir.join("main.sf");
    write_text(&input, "#define macro MAIN = takes(0) returns(0) { stop }\n");
    let output = run_stackforge(&[input.to_str().expect("utf8 path"), "--max-depth", "0"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--max-depth must be at least 1"));
}
