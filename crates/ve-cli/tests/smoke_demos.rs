use std::process::Command;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_ve-cli"))
        .args(args)
        .output()
        .expect("cli should execute")
}

#[test]
fn check_passes_for_all_rhai_demos() {
    let names = ve_test_example::demo_names();
    assert!(!names.is_empty(), "expected bundled Rhai demos");

    for name in names {
        let directory = ve_test_example::demo_dir(&name);
        let output = run_cli(&[
            "check",
            "--case-dir",
            directory.to_str().expect("path should be utf-8"),
        ]);

        if !output.status.success() {
            panic!(
                "demo {} failed\nstdout:\n{}\nstderr:\n{}",
                name,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("RESULT:OK"), "stdout missing RESULT:OK for {}", name);
        assert!(stdout.contains("EVENT:"), "stdout missing EVENT for {}", name);
        assert!(stdout.contains("ENTITY:"), "stdout missing ENTITY for {}", name);
    }
}

#[test]
fn run_streams_events_then_entity_summaries() {
    let directory = ve_test_example::demo_dir("01-homely");
    let output = run_cli(&[
        "run",
        "--behaviors-dir",
        directory.to_str().expect("path should be utf-8"),
        "--spawn",
        "homely@1,1",
        "--spawn",
        "homely",
        "--tick-ms",
        "10",
        "--duration-ms",
        "150",
    ]);
    assert!(output.status.success(), "run failed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let entities = stdout
        .lines()
        .filter(|line| line.starts_with("ENTITY:"))
        .count();
    assert_eq!(entities, 2);
    assert!(stdout.contains("\"kind\":\"cha\""));
    assert_eq!(stdout.lines().last(), Some("RESULT:OK"));
}

#[test]
fn run_reports_unknown_behavior_as_error_lines() {
    let directory = ve_test_example::demo_dir("01-homely");
    let output = run_cli(&[
        "run",
        "--behaviors-dir",
        directory.to_str().expect("path should be utf-8"),
        "--spawn",
        "dragon",
    ]);
    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RESULT:ERROR"));
    assert!(stdout.contains("ERROR_CODE:BEHAVIOR_NOT_FOUND"));
}
