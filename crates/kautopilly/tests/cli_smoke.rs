use std::net::TcpListener;
use std::process::Command;

fn unreachable_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral loopback port");
    let port = listener.local_addr().expect("read local addr").port();
    drop(listener);
    port.to_string()
}

#[test]
fn kautopilly_probe_unreachable_smoke() {
    let port = unreachable_port();
    let output = Command::new(env!("CARGO_BIN_EXE_kautopilly"))
        .args([
            "probe",
            "--address",
            "127.0.0.1",
            "--rpc-port",
            &port,
            "--stream-port",
            &port,
        ])
        .env_remove("RUST_LOG")
        .output()
        .expect("run kautopilly probe");

    assert!(!output.status.success(), "expected connection failure");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error:"),
        "expected formatted error, stderr was: {stderr}"
    );
    assert!(
        stderr.contains("Is kRPC server started?"),
        "expected server hint, stderr was: {stderr}"
    );
}

#[test]
fn kautopilly_probe_rejects_bad_port() {
    let output = Command::new(env!("CARGO_BIN_EXE_kautopilly"))
        .args(["probe", "--rpc-port", "70000"])
        .output()
        .expect("run kautopilly probe");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("out of range"), "stderr was: {stderr}");
}

#[test]
fn kautopilly_monitor_simulated_smoke() {
    let output = Command::new(env!("CARGO_BIN_EXE_kautopilly"))
        .args(["monitor", "--simulate", "--count", "3", "--every-ms", "0"])
        .env_remove("RUST_LOG")
        .output()
        .expect("run kautopilly monitor");

    assert!(
        output.status.success(),
        "stderr was: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "stdout was: {stdout}");
    assert!(lines.iter().all(|line| line.contains("alt") && line.contains('°')));
}

#[test]
fn kautopilly_probe_simulated_smoke() {
    let output = Command::new(env!("CARGO_BIN_EXE_kautopilly"))
        .args(["probe", "--simulate"])
        .output()
        .expect("run kautopilly probe");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("connected to 127.0.0.1:50000"), "stdout was: {stdout}");
}
