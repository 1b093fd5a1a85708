//! Shared builders for integration tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use camelot_bridge::config::{
    CamelotConfig, Escalation, LoggingConfig, PlatformConfig, QueueConfig, RelayConfig,
    RestartConfig, RestartPolicy,
};

/// Camelot settings running `sh -c <script> <args…>` without a shell wrapper.
pub fn sh_camelot(script: &str, args: &[&str]) -> CamelotConfig {
    let mut argv = vec![script.to_owned()];
    argv.extend(args.iter().map(|&arg| arg.to_owned()));
    CamelotConfig {
        interpreter: "sh".into(),
        script: PathBuf::from("-c"),
        args: argv,
        shell: false,
        working_dir: None,
        child_exit_grace_seconds: 1,
    }
}

/// Fast restart policy so tests never wait on production backoff.
pub fn quick_policy(max_restarts: u32, on_exhausted: Escalation) -> RestartPolicy {
    RestartPolicy {
        max_restarts,
        initial_backoff_ms: 20,
        max_backoff_ms: 100,
        healthy_after_seconds: 30,
        on_exhausted,
    }
}

/// Relay configuration pointing at `address` and launching `camelot`.
pub fn relay_config(address: String, camelot: CamelotConfig, log_dir: &Path) -> RelayConfig {
    RelayConfig {
        platform: PlatformConfig {
            address,
            outbound_address: None,
            connect_timeout_seconds: 2,
        },
        camelot,
        queues: QueueConfig { capacity: 8 },
        restart: RestartConfig {
            platform: quick_policy(5, Escalation::Degrade),
            camelot: quick_policy(5, Escalation::Degrade),
        },
        logging: LoggingConfig {
            dir: log_dir.to_path_buf(),
            file_prefix: "test-".into(),
        },
        shutdown_grace_seconds: 5,
    }
}

/// Poll `check` every 20ms until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
