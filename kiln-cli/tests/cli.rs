use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

const MAIN: &str = "int main() {\n    return 0\n}\n";

fn kiln() -> Command {
    let mut cmd = Command::cargo_bin("kiln").expect("kiln binary");
    cmd.env_remove("KILN_LOG");
    cmd
}

#[test]
fn compiles_a_file_to_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.kn");
    fs::write(&input, MAIN).expect("write source");

    kiln()
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("#include <stdint.h>\n"))
        .stdout(predicate::str::contains("int32_t main(void)\n{\n    return (0);\n}\n"));
}

#[test]
fn reads_stdin_without_inputs() {
    kiln()
        .write_stdin("int x = 1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("int32_t x = 1;"));
}

#[test]
fn writes_the_ast_dump_to_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("main.kn");
    let output = dir.path().join("out/main.ast");
    fs::write(&input, MAIN).expect("write source");

    kiln()
        .arg(&input)
        .args(["--emit", "ast", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let dump = fs::read_to_string(&output).expect("dump written");
    assert!(dump.contains("Identifier: main"), "{dump}");
    assert!(dump.contains("Return"), "{dump}");
}

#[test]
fn searches_include_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let include = dir.path().join("include");
    fs::create_dir_all(&include).expect("mkdir");
    fs::write(include.join("kiln_limits.h"), "#define LIMIT 8\n").expect("write header");
    let input = dir.path().join("main.kn");
    fs::write(&input, "include kiln_limits\nint limit = LIMIT\n").expect("write source");

    kiln()
        .arg(&input)
        .arg("-I")
        .arg(&include)
        .assert()
        .success()
        .stdout(predicate::str::contains("#include <kiln_limits.h>\n"))
        .stdout(predicate::str::contains("int32_t limit = LIMIT;"));
}

#[test]
fn compiles_macro_calls_and_reference_parameters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let include = dir.path().join("include");
    fs::create_dir_all(&include).expect("mkdir");
    fs::write(include.join("kiln_pair.h"), "#define ADD(a, b) ((a) + (b))\n").expect("write header");
    let input = dir.path().join("main.kn");
    fs::write(
        &input,
        "include kiln_pair\n\
         void inc(ref int x) {\n    x += 1\n}\n\
         int main() {\n    int n = ADD(1, 2)\n    inc(n)\n    return n\n}\n",
    )
    .expect("write source");

    kiln()
        .arg(&input)
        .arg("-I")
        .arg(&include)
        .assert()
        .success()
        .stdout(predicate::str::contains("void inc(int32_t* x)\n"))
        .stdout(predicate::str::contains("    (*x) += 1;\n"))
        .stdout(predicate::str::contains("    int32_t n = ADD(1, 2);\n"))
        .stdout(predicate::str::contains("    inc(&n);\n"));
}

#[test]
fn fills_nested_default_arguments() {
    kiln()
        .write_stdin("int h(int x = 1) {\nreturn x\n}\nint g(int a = h()) {\nreturn a\n}\nint main() {\nreturn g()\n}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("return (g(h(1)));"));
}

#[test]
fn rejects_references_to_other_types() {
    kiln()
        .write_stdin("void inc(ref int x) {\n    x += 1\n}\nint main() {\n    double d = 1.0\n    inc(d)\n    return 0\n}\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E03"));
}

#[test]
fn compiles_directories_into_an_output_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("nested")).expect("mkdir");
    fs::write(src.join("first.kn"), "int first = 1\n").expect("write source");
    fs::write(src.join("nested/second.kn"), "int second = 2\n").expect("write source");
    fs::write(src.join("README.md"), "not a source\n").expect("write readme");
    let out = dir.path().join("build");

    kiln().arg(&src).arg("-o").arg(&out).assert().success();

    let first = fs::read_to_string(out.join("first.c")).expect("first.c");
    let second = fs::read_to_string(out.join("second.c")).expect("second.c");
    assert!(first.contains("int32_t first = 1;"), "{first}");
    assert!(second.contains("int32_t second = 2;"), "{second}");
    assert!(!out.join("README.c").exists());
}

#[test]
fn reports_errors_and_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("broken.kn");
    fs::write(&input, "int main() {\n    return missing\n}\n").expect("write source");

    kiln()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E0301]: unresolved identifier `missing`"));
}

#[test]
fn failed_units_do_not_stop_the_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("good.kn"), "int good = 1\n").expect("write source");
    fs::write(dir.path().join("bad.kn"), "int bad = nope\n").expect("write source");
    let out = dir.path().join("build");

    kiln()
        .arg(dir.path())
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unresolved identifier `nope`"))
        .stderr(predicate::str::contains("1 of 2 units failed to compile"));

    assert!(out.join("good.c").exists());
    assert!(!out.join("bad.c").exists());
}

#[test]
fn data_model_sizes_platform_integers() {
    kiln()
        .args(["--data-model", "llp64"])
        .write_stdin("c_long big = 1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("int32_t big = 1;"));

    kiln()
        .write_stdin("c_long big = 1\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("int64_t big = 1;"));
}

#[test]
fn rejects_unknown_emit_formats() {
    kiln()
        .args(["--emit", "wasm"])
        .write_stdin(MAIN)
        .assert()
        .failure()
        .stderr(predicate::str::contains("wasm"));
}
