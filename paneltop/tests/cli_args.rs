//! CLI arg parsing tests for paneltop
use assert_cmd::Command;

fn paneltop() -> Command {
    let mut cmd = Command::cargo_bin("paneltop").expect("paneltop binary");
    cmd.env_remove("PANELTOP_TOKEN");
    cmd
}

fn output_text(out: &std::process::Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

#[test]
fn help_mentions_short_and_long_flags() {
    let out = paneltop().arg("--help").output().expect("run paneltop --help");
    assert!(out.status.success());
    let text = output_text(&out);
    for flag in [
        "--token", "-k", "--tls-ca", "-t", "--origin", "--server", "-s", "--profile", "-P",
        "--save", "--cpu-limit", "--memory-limit", "--disk-limit", "--address", "--dry-run",
    ] {
        assert!(text.contains(flag), "help text missing {flag}\n{text}");
    }
}

#[test]
fn flags_accepted_alongside_help() {
    for args in [
        &["--tls-ca", "/tmp/cert.pem", "--help"][..],
        &["-t", "/tmp/cert.pem", "--help"][..],
        &["--profile", "dev", "--help"][..],
        &["-k", "abc", "--memory-limit", "512", "--help"][..],
    ] {
        let out = paneltop().args(args).output().expect("run paneltop");
        assert!(out.status.success(), "paneltop {args:?} did not succeed");
        assert!(output_text(&out).contains("Usage:"));
    }
}

#[test]
fn bad_limit_is_rejected() {
    let out = paneltop()
        .args(["--memory-limit", "lots", "ws://x/ws"])
        .output()
        .expect("run paneltop");
    assert!(!out.status.success());
}

#[test]
fn dry_run_prints_resolved_history_key() {
    let td = tempfile::tempdir().unwrap();
    let out = paneltop()
        .env("XDG_CONFIG_HOME", td.path())
        .args(["--dry-run", "wss://node.example.com:8080/api/servers/1a2b/ws"])
        .output()
        .expect("run paneltop");
    assert!(out.status.success());
    let text = output_text(&out);
    assert!(text.contains("server: 1a2b"), "{text}");
}
