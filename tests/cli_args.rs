use assert_cmd::Command;
use predicates::prelude::*;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;

fn cmd(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("liveness-check").expect("binary");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

/// Answers every request with `{"diagnostic":"LIVE"}` until the test exits.
fn spawn_sdk() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            if reader.read_exact(&mut body).is_err() {
                continue;
            }
            let payload = r#"{"diagnostic":"LIVE"}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            );
            let _ = reader.get_mut().write_all(response.as_bytes());
        }
    });
    port
}

fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn four_sdk_ports_is_a_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .args(["-dir", "does-not-exist", "--use-sdk", "--sdk-port", "8080", "9090", "1111", "2222"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at most 3 SDK ports"));
}

#[test]
fn version_count_must_match_ports() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .args(["--image", "x.jpg", "--use-sdk", "--sdk-port", "8080", "9090", "--sdk-version", "1.0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("must match"));
}

#[test]
fn missing_image_source_is_a_config_error() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .args(["--use-saas"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no image source"));
}

#[test]
fn missing_directory_fails_after_validation() {
    let tmp = tempfile::tempdir().unwrap();
    cmd(tmp.path())
        .args(["-dir", "nowhere", "--use-sdk", "--sdk-port", "8080"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("path not found"));
}

#[test]
fn image_flag_on_a_directory_says_not_a_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("imgs")).unwrap();
    cmd(tmp.path())
        .args(["-img", "imgs", "--use-sdk", "--sdk-port", "8080"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not a file"));
}

#[test]
fn unreachable_sdk_only_fails_its_own_column() {
    let tmp = tempfile::tempdir().unwrap();
    let images = tmp.path().join("imgs");
    std::fs::create_dir(&images).unwrap();
    let px = vec![200u8; 16 * 16 * 3];
    for name in ["a.png", "b.jpg"] {
        image::save_buffer(images.join(name), &px, 16, 16, image::ExtendedColorType::Rgb8).unwrap();
    }

    let live = spawn_sdk().to_string();
    let dead = closed_port().to_string();
    cmd(tmp.path())
        .args([
            "-dir",
            "imgs",
            "--use-sdk",
            "--sdk-port",
            &live,
            &dead,
            "--sdk-version",
            "5.0",
            "5.1",
            "--analyze-jpeg-quality",
            "-o",
            "out/report.md",
            "-w",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"evaluated\": 2"));

    let md = std::fs::read_to_string(tmp.path().join("out/report.md")).unwrap();
    let lines: Vec<&str> = md.lines().collect();
    assert_eq!(
        lines[0],
        "| Title | Photo | Resolution | Size | JPEG Quality | Diagnostic SDK 5.0 | Diagnostic SDK 5.1 |"
    );
    assert_eq!(lines.len(), 4);
    assert!(lines[2].starts_with("| a |"));
    assert!(lines[2].contains("not a JPEG"));
    assert!(lines[2].contains("| 16 x 16 |"));
    assert!(lines[3].starts_with("| b |"));
    assert!(lines[3].contains('%'));
    for row in &lines[2..] {
        assert!(row.contains("| LIVE | Error:"), "row: {row}");
    }
    assert!(tmp.path().join("out/temp_images/a.png").exists());
}
