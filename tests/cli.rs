// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate assert_cmd;
extern crate mandelterm;
extern crate nix;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use mandelterm::{AnsiWriter, Backend, GridSpec, RenderConfig};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

fn mandel() -> Command {
    Command::cargo_bin("mandel").unwrap()
}

// What a single thread draws for a 40x30 image at 500 iterations.
fn reference() -> Vec<u8> {
    let config = RenderConfig {
        grid: GridSpec {
            columns: 40,
            rows: 30,
            max_iterations: 500,
            ..GridSpec::default()
        },
        workers: 1,
        backend: Backend::Threads,
        glyph: b'@',
    };
    let mut sink = AnsiWriter::new(Vec::new(), b'@');
    mandelterm::render(&config, &mut sink, &AtomicBool::new(false)).unwrap();
    sink.into_inner()
}

fn small_render(workers: &str, mode: &str) -> Vec<u8> {
    let output = mandel()
        .args(&[workers, "--mode", mode, "--size", "40x30", "--iterations", "500"])
        .output()
        .unwrap();
    assert!(output.status.success());
    output.stdout
}

#[test]
fn missing_worker_count_is_fatal() {
    mandel().assert().failure().code(1);
}

#[test]
fn non_numeric_worker_count_is_fatal() {
    mandel()
        .arg("many")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not parse worker count"));
}

#[test]
fn zero_workers_is_fatal() {
    mandel().arg("0").assert().failure().code(1);
}

#[test]
fn threads_draw_rows_in_order() {
    let expected = reference();
    for workers in &["1", "3", "8"] {
        assert_eq!(small_render(workers, "threads"), expected);
    }
}

#[test]
fn processes_draw_rows_in_order() {
    let expected = reference();
    for workers in &["1", "4", "7"] {
        assert_eq!(small_render(workers, "processes"), expected);
    }
}

#[test]
fn processes_share_a_file_sink() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let status = mandel()
        .args(&["5", "--mode", "processes", "--size", "40x30", "--iterations", "500"])
        .stdout(Stdio::from(file.reopen().unwrap()))
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(fs::read(file.path()).unwrap(), reference());
}

#[test]
fn more_processes_than_rows() {
    let output = mandel()
        .args(&["8", "--mode", "processes", "--size", "5x3", "--iterations", "100"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(output.stdout.iter().filter(|&&b| b == b'\n').count(), 3);
    assert!(output.stdout.ends_with(b"\n\x1b[0m"));
}

#[test]
fn default_image_is_ninety_by_fifty() {
    let output = mandel()
        .args(&["2", "--iterations", "200"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = text.split('\n').collect();
    assert_eq!(lines.len(), 51);
    assert_eq!(lines[0].matches('@').count(), 90);
    assert_eq!(lines[50], "\x1b[0m");
}

// Starts a render far too big to finish, interrupts it after `delay`
// and requires it to stop, reset the colors and exit 130 within a few
// seconds.
fn interrupted(workers: &str, mode: &str, delay: u64) {
    let mut child = mandel()
        .args(&[workers, "--mode", mode, "--size", "90x1000", "--iterations", "500000"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdout = child.stdout.take().unwrap();
    let reader = thread::spawn(move || {
        let mut bytes = Vec::new();
        stdout.read_to_end(&mut bytes).unwrap();
        bytes
    });

    thread::sleep(Duration::from_millis(delay));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let signalled = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if signalled.elapsed() > Duration::from_secs(10) {
            let _ = child.kill();
            panic!(
                "{} {} still running 10s after SIGINT (sent at {}ms)",
                workers, mode, delay
            );
        }
        thread::sleep(Duration::from_millis(20));
    };
    let stdout = reader.join().unwrap();

    assert_eq!(status.code(), Some(130));
    assert!(stdout.ends_with(b"\x1b[0m"));
    let rows = stdout.iter().filter(|&&b| b == b'\n').count();
    assert!(rows < 1000);
    if rows > 0 {
        assert!(stdout.ends_with(b"\n\x1b[0m"));
    }
}

#[test]
fn interrupted_threads_reset_the_terminal() {
    for workers in &["1", "2", "6"] {
        for &delay in &[200, 700] {
            interrupted(workers, "threads", delay);
        }
    }
}

#[test]
fn interrupted_processes_reset_the_terminal() {
    for workers in &["1", "2", "4", "6"] {
        for &delay in &[200, 500, 1000] {
            interrupted(workers, "processes", delay);
        }
    }
}
