//! Integration tests for launching and winding down Camelot children.
#![cfg(unix)]

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use camelot_bridge::camelot::{ChildProcessSupervisor, LaunchStrategy};
use camelot_bridge::AppError;

use super::test_helpers::sh_camelot;

fn supervisor(script: &str, exit_grace: Duration) -> ChildProcessSupervisor {
    let plan = LaunchStrategy::Direct.plan(&sh_camelot(script, &[]));
    ChildProcessSupervisor::new(plan, exit_grace)
}

/// A child echoing stdin round-trips a line and exits once stdin closes.
#[tokio::test]
async fn echo_child_round_trips_and_exits_on_stdin_close() {
    let supervisor = supervisor("exec cat", Duration::from_secs(5));
    let mut child = supervisor.launch(1).expect("launch");
    assert_eq!(child.generation(), 1);
    assert!(child.pid().is_some());

    {
        let (stdout, stdin) = child.streams();
        stdin.write_all(b"hello camelot\n").await.expect("write");
        stdin.flush().await.expect("flush");

        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), BufReader::new(stdout).read_line(&mut line))
            .await
            .expect("echo must arrive")
            .expect("read");
        assert_eq!(line, "hello camelot\n");
    }

    let status = child.shutdown().await.expect("exit status");
    assert!(status.success());
}

/// An interpreter that does not exist is a `Spawn` error.
#[tokio::test]
async fn missing_interpreter_is_spawn_error() {
    let mut config = sh_camelot("true", &[]);
    config.interpreter = "/nonexistent/camelot-interpreter".into();
    let supervisor =
        ChildProcessSupervisor::new(LaunchStrategy::Direct.plan(&config), Duration::from_secs(1));

    let err = supervisor.launch(1).expect_err("launch must fail");

    assert!(matches!(err, AppError::Spawn(ref msg) if msg.contains("camelot-interpreter")));
}

/// A child that ignores stdin close is terminated after the grace period.
#[tokio::test]
async fn child_ignoring_stdin_is_terminated() {
    let supervisor = supervisor("exec sleep 30", Duration::from_millis(200));
    let child = supervisor.launch(2).expect("launch");

    let started = Instant::now();
    let status = tokio::time::timeout(Duration::from_secs(10), child.shutdown())
        .await
        .expect("shutdown must finish")
        .expect("exit status");

    assert!(!status.success());
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// A child that also ignores SIGTERM is killed.
#[tokio::test]
async fn child_ignoring_sigterm_is_killed() {
    let supervisor = supervisor("trap '' TERM; exec sleep 30", Duration::from_millis(200));
    let child = supervisor.launch(3).expect("launch");

    let status = tokio::time::timeout(Duration::from_secs(10), child.shutdown())
        .await
        .expect("shutdown must finish")
        .expect("exit status");

    assert!(!status.success());
}
