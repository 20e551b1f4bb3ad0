use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn tmp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("tonecast-cli-tests");
    fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir.join(name)
}

fn run_tonecast(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tonecast"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute tonecast");

    child
        .stdin
        .take()
        .expect("stdin not captured")
        .write_all(stdin)
        .expect("Failed to write stdin");

    child.wait_with_output().expect("Failed to wait for tonecast")
}

fn combined_output(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout)
}

#[test]
fn test_render_hi_to_wav() {
    let wav = tmp_path("hi.wav");
    let _ = fs::remove_file(&wav);

    let output = run_tonecast(
        &["--output", wav.to_str().unwrap(), "--drain-poll-ms", "10", "--drain-timeout", "30"],
        b"hi\n",
    );
    let text = combined_output(&output);

    assert!(output.status.success(), "tonecast failed: {}", text);
    assert!(text.contains("Let's go."), "missing start message: {}", text);
    assert!(text.contains("1 line(s), 3 byte(s) as 80 symbols"), "unexpected summary: {}", text);

    let mut reader = hound::WavReader::open(&wav).expect("WAV not written");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.bits_per_sample, 16);

    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();

    // One idle slot, then 80 symbols; rendering stops within a callback of the last pop
    assert!(samples.len() >= 80 * 441, "too short: {}", samples.len());
    assert!(samples.len() <= 81 * 441 + 220, "too long: {}", samples.len());

    assert!(samples[..400].iter().all(|&s| s == 0), "leading slot should be silent");
    let data = &samples[441..441 * 31];
    assert!(data.iter().any(|&s| s.abs() > 15000), "data symbols should carry tone");
    assert!(data.iter().all(|&s| s.abs() <= 20000));
    assert!(samples[441 * 32..].iter().all(|&s| s == 0), "trailer should be silent");
}

#[test]
fn test_render_from_input_file() {
    let input = tmp_path("two_lines.txt");
    fs::write(&input, "ab\ncd").expect("Failed to write input");
    let wav = tmp_path("two_lines.wav");

    let output = run_tonecast(
        &[
            "--input",
            input.to_str().unwrap(),
            "--output",
            wav.to_str().unwrap(),
            "--drain-poll-ms",
            "10",
        ],
        b"",
    );
    let text = combined_output(&output);

    assert!(output.status.success(), "tonecast failed: {}", text);
    // Missing final newline still gets a terminator
    assert!(text.contains("2 line(s), 6 byte(s) as 110 symbols"), "unexpected summary: {}", text);
    assert!(wav.exists());
}

#[test]
fn test_custom_rates() {
    let wav = tmp_path("custom.wav");

    let output = run_tonecast(
        &[
            "--output",
            wav.to_str().unwrap(),
            "--sample-rate",
            "16000",
            "--symbol-rate",
            "50",
            "--drain-poll-ms",
            "10",
        ],
        b"x",
    );
    let text = combined_output(&output);
    assert!(output.status.success(), "tonecast failed: {}", text);
    // 2 bytes + 25 idle symbols
    assert!(text.contains("as 45 symbols"), "unexpected summary: {}", text);

    let reader = hound::WavReader::open(&wav).expect("WAV not written");
    assert_eq!(reader.spec().sample_rate, 16000);
}

#[test]
fn test_invalid_config_exits_with_failure() {
    let wav = tmp_path("invalid.wav");

    let output = run_tonecast(
        &["--output", wav.to_str().unwrap(), "--freq-high", "30000"],
        b"",
    );

    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(text.contains("Invalid configuration"), "unexpected output: {}", text);
}

#[test]
fn test_missing_input_file_exits_with_failure() {
    let wav = tmp_path("missing.wav");

    let output = run_tonecast(
        &["--input", "/nonexistent/tonecast/input.txt", "--output", wav.to_str().unwrap()],
        b"",
    );

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_huge_drain_timeout_is_rejected_not_a_panic() {
    let wav = tmp_path("huge_timeout.wav");

    let output = run_tonecast(
        &["--output", wav.to_str().unwrap(), "--drain-timeout", "1e30"],
        b"",
    );

    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("Invalid configuration"), "unexpected output: {}", text);
    assert!(!text.contains("panicked"), "unexpected panic: {}", text);
}
