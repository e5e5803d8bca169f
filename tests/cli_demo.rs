//! Smoke-tests the compiled binary's one-shot subcommand surface in demo
//! mode, where no real SSH credentials or filesystem access are needed.

use std::io::Write;
use std::process::{Command, Stdio};

fn sftpc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sftpc"))
}

fn write_manifest(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("manifest.json");
    std::fs::write(
        &path,
        r#"[{"project":"demo","type":"Workfile","description":"smoke test","site":"demo-site","files":[["/a","/ra"],["/b","/rb"]]}]"#,
    )
    .unwrap();
    path
}

#[test]
fn stage_and_dispatch_completes_in_demo_mode() {
    let dir = std::env::temp_dir().join(format!("sftpc-cli-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let manifest = write_manifest(&dir);
    let log_dir = dir.join("logs");

    let output = sftpc()
        .arg("--demo")
        .arg("--sites-dir")
        .arg(&dir)
        .env("SFTPC_LOG_DIR", &log_dir)
        .arg("stage")
        .arg(&manifest)
        .arg("--dispatch")
        .output()
        .expect("failed to run sftpc binary");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("staged 1 package"), "stdout was: {stdout}");
}

#[test]
fn list_with_nothing_staged_prints_empty_tables() {
    let dir = std::env::temp_dir().join(format!("sftpc-cli-list-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let output =
        sftpc().arg("--demo").arg("--sites-dir").arg(&dir).arg("list").output().expect("failed to run sftpc binary");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("(none)"));
}

#[test]
fn repl_stages_and_lists_then_quits() {
    let dir = std::env::temp_dir().join(format!("sftpc-cli-repl-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let manifest = write_manifest(&dir);

    let mut child = sftpc()
        .arg("--demo")
        .arg("--sites-dir")
        .arg(&dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn sftpc binary");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "stage {}", manifest.display()).unwrap();
        writeln!(stdin, "list").unwrap();
        writeln!(stdin, "quit").unwrap();
    }

    let output = child.wait_with_output().expect("failed to wait on sftpc binary");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("staged 1 package"), "stdout was: {stdout}");
}
