
use fixtures::*;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn binxml_dump() -> Command {
    Command::new(assert_cmd::cargo_bin!("binxml_dump"))
}

#[test]
fn it_renders_xml_to_stdout() {
    let d = tempdir().unwrap();
    let sample = write_fixture(&d, "event.bin", &sample_event());

    binxml_dump()
        .arg(&sample)
        .assert()
        .success()
        .stdout(predicate::str::contains(SAMPLE_EVENT_XML));
}

#[test]
fn it_prints_json_tree() {
    let d = tempdir().unwrap();
    let sample = write_fixture(&d, "event.bin", &sample_event());

    let output = binxml_dump()
        .args(["-o", "json"])
        .arg(&sample)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json["fragment"]["body"]["Template"]["guid"],
        "ABABABAB-ABAB-ABAB-ABAB-ABABABABABAB"
    );
}

#[test]
fn it_respects_no_escape() {
    let d = tempdir().unwrap();
    let sample = write_fixture(
        &d,
        "escape.bin",
        &element_document(&element("E").child(text("a<b"))),
    );

    binxml_dump()
        .arg(&sample)
        .assert()
        .success()
        .stdout(predicate::str::contains("<E>a&lt;b</E>"));

    binxml_dump()
        .arg("--no-escape")
        .arg(&sample)
        .assert()
        .success()
        .stdout(predicate::str::contains("<E>a<b</E>"));
}

#[test]
fn it_respects_ansi_codec() {
    let d = tempdir().unwrap();
    let sample = write_fixture(&d, "ansi.bin", &ansi_document());

    binxml_dump()
        .args(["--ansi-codec", "windows-1251"])
        .arg(&sample)
        .assert()
        .success()
        .stdout(predicate::str::contains("<A>caf\u{439}</A>"));
}

#[test]
fn it_respects_directory_output() {
    let d = tempdir().unwrap();
    let f = d.as_ref().join("nested").join("test.out");
    let sample = write_fixture(&d, "event.bin", &sample_event());

    let output = binxml_dump()
        .args(["-f", &f.to_string_lossy()])
        .arg(&sample)
        .output()
        .unwrap();

    assert!(
        output.stdout.is_empty(),
        "Expected output to be printed to file, but was printed to stdout"
    );
    let written = fs::read_to_string(&f).unwrap();
    assert!(written.contains(SAMPLE_EVENT_XML));
}

#[test]
fn test_it_refuses_to_overwrite_directory() {
    let d = tempdir().unwrap();
    let sample = write_fixture(&d, "event.bin", &sample_event());

    binxml_dump()
        .args(["-f", &d.path().to_string_lossy()])
        .arg(&sample)
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_it_overwrites_file_anyways_if_passed_flag() {
    let d = tempdir().unwrap();
    let f = d.as_ref().join("test.out");
    let sample = write_fixture(&d, "event.bin", &sample_event());

    let mut file = File::create(&f).unwrap();
    file.write_all(b"I'm a file!").unwrap();

    binxml_dump()
        .args(["-f", &f.to_string_lossy(), "--no-confirm-overwrite"])
        .arg(&sample)
        .assert()
        .success();

    let written = fs::read_to_string(&f).unwrap();
    assert!(!written.contains("I'm a file!"));
    assert!(written.contains(SAMPLE_EVENT_XML));
}

#[test]
fn it_keeps_going_after_a_bad_input() {
    let d = tempdir().unwrap();
    let bad = write_fixture(&d, "bad.bin", &[0x0f, 0x01]);
    let good = write_fixture(&d, "good.bin", &element_document(&element("Good")));

    binxml_dump()
        .arg(&bad)
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("<Good />"))
        .stderr(predicate::str::contains("bad.bin"));
}

#[test]
fn it_stops_after_error_when_asked() {
    let d = tempdir().unwrap();
    let bad = write_fixture(&d, "bad.bin", &[0x0f, 0x01]);
    let good = write_fixture(&d, "good.bin", &element_document(&element("Good")));

    binxml_dump()
        .arg("--stop-after-error")
        .arg(&bad)
        .arg(&good)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("<Good />").not());
}
