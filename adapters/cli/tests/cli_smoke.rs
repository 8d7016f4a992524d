use std::{
    env, fs,
    path::PathBuf,
    process::{Command, Output},
};

fn magnet_defence(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_magnet-defence"))
        .args(args)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to launch the magnet-defence binary")
}

fn session_file(name: &str, contents: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("magnet-defence-{}-{name}.toml", std::process::id()));
    fs::write(&path, contents).expect("session file written");
    path
}

#[test]
fn every_subcommand_documents_itself() {
    for command in ["rendezvous", "play", "simulate"] {
        let output = magnet_defence(&[command, "--help"]);
        assert!(output.status.success(), "`{command} --help` failed");
        let help = String::from_utf8_lossy(&output.stdout);
        assert!(help.contains("Usage"), "`{command} --help` printed: {help}");
    }
}

#[test]
fn unknown_subcommands_fail() {
    let output = magnet_defence(&["teleport"]);
    assert!(!output.status.success());
}

#[test]
fn simulate_runs_the_builtin_level_to_the_tick_limit() {
    let output = magnet_defence(&["simulate", "--ticks", "30"]);
    assert!(output.status.success(), "simulate exited with {}", output.status);
    let log = String::from_utf8_lossy(&output.stdout);
    assert!(log.contains("world ready"), "log was: {log}");
    assert!(log.contains("session over"), "log was: {log}");
}

#[test]
fn simulate_rejects_malformed_session_files() {
    let path = session_file("malformed", "[game]\nbogus = 1\n");
    let output = magnet_defence(&["simulate", "--config", &path.to_string_lossy()]);
    let _ = fs::remove_file(&path);
    assert!(!output.status.success());
}

#[test]
fn simulate_honours_the_session_tick_limit() {
    let path = session_file("limited", "[game]\nmax_ticks = 12\n");
    let output = magnet_defence(&["simulate", "--config", &path.to_string_lossy()]);
    let _ = fs::remove_file(&path);
    assert!(output.status.success(), "simulate exited with {}", output.status);
    let log = String::from_utf8_lossy(&output.stdout);
    assert!(log.contains("session over"), "log was: {log}");
    assert!(log.contains("ticks=12"), "log was: {log}");
}
