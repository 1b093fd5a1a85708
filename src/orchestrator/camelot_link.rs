//! Camelot link supervisor.
//!
//! Launches the Camelot child, runs the Camelot receiver and sender against
//! its stdio, and relaunches with backoff when the child fails to start,
//! exits, or breaks a pipe. Every generation's child is wound down through
//! [`CamelotChild::shutdown`](crate::camelot::CamelotChild::shutdown) before
//! the next one starts, including on relay shutdown.

use std::time::Instant;

use tracing::{error, info, warn};

use crate::camelot::ChildProcessSupervisor;
use crate::orchestrator::backoff::Backoff;
use crate::orchestrator::{
    escalate, run_generation, sleep_or_shutdown, GenerationEnd, LinkContext, LinkOutcome,
};
use crate::pump::{Endpoint, Pump};
use crate::queue::{QueueReceiver, QueueSender};

/// Supervise the Camelot link until shutdown or escalation.
///
/// `outbound` receives every line the child prints; `inbound` supplies every
/// line written to the child's stdin.
pub async fn run_camelot_link(
    supervisor: ChildProcessSupervisor,
    ctx: LinkContext,
    outbound: QueueSender,
    mut inbound: QueueReceiver,
) -> LinkOutcome {
    let mut backoff = Backoff::new(ctx.policy.clone());
    let mut generation: u32 = 0;

    loop {
        if !ctx.coordinator.is_running() {
            return LinkOutcome::Stopped;
        }
        generation += 1;

        let failure = match supervisor.launch(generation) {
            Err(err) => {
                error!(generation, error = %err, "camelot link: launch failed");
                err
            }
            Ok(mut child) => {
                let started = Instant::now();
                let (stdout, stdin) = child.streams();
                let end = run_generation(
                    Endpoint::Camelot,
                    (Pump::CamelotReceiver, Pump::CamelotSender),
                    stdout,
                    stdin,
                    &outbound,
                    &mut inbound,
                    ctx.coordinator.token(),
                )
                .await;
                backoff.record_run(started.elapsed());
                child.shutdown().await;

                match end {
                    GenerationEnd::Failed(err) if ctx.coordinator.is_running() => {
                        warn!(generation, error = %err, "camelot link: child stopped relaying");
                        err
                    }
                    _ => return LinkOutcome::Stopped,
                }
            }
        };

        let Some(delay) = backoff.next_delay() else {
            return escalate(&ctx, Endpoint::Camelot, failure).await;
        };
        info!(attempt = backoff.failures(), ?delay, "camelot link: relaunching");
        if !sleep_or_shutdown(&ctx.coordinator, delay).await {
            return LinkOutcome::Stopped;
        }
    }
}
