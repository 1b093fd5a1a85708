//! Platform link supervisor.
//!
//! Connects to the Platform, runs the Platform receiver and sender against
//! the connection, and reconnects with backoff whenever the connection
//! fails or the peer closes it. Queue ends survive reconnects, so messages
//! waiting in the outbound queue go out on the next connection.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::PlatformConfig;
use crate::orchestrator::backoff::Backoff;
use crate::orchestrator::{
    escalate, run_generation, sleep_or_shutdown, GenerationEnd, LinkContext, LinkOutcome,
};
use crate::platform;
use crate::pump::{Endpoint, Pump};
use crate::queue::{QueueReceiver, QueueSender};

/// Supervise the Platform link until shutdown or escalation.
///
/// `inbound` receives every line read from the Platform; `outbound` supplies
/// every line written to it.
pub async fn run_platform_link(
    config: PlatformConfig,
    connect_timeout: Duration,
    ctx: LinkContext,
    inbound: QueueSender,
    mut outbound: QueueReceiver,
) -> LinkOutcome {
    let mut backoff = Backoff::new(ctx.policy.clone());
    let mut connections: u32 = 0;

    loop {
        let connected = tokio::select! {
            biased;
            () = ctx.coordinator.cancelled() => return LinkOutcome::Stopped,
            result = platform::connect(&config, connect_timeout) => result,
        };

        let failure = match connected {
            Err(err) => {
                warn!(error = %err, "platform link: connect failed");
                err
            }
            Ok(connection) => {
                connections += 1;
                info!(connection = connections, peer = %connection.peer, "platform link: relaying");

                let started = Instant::now();
                let end = run_generation(
                    Endpoint::Platform,
                    (Pump::PlatformReceiver, Pump::PlatformSender),
                    connection.reader,
                    connection.writer,
                    &inbound,
                    &mut outbound,
                    ctx.coordinator.token(),
                )
                .await;
                backoff.record_run(started.elapsed());

                match end {
                    GenerationEnd::Failed(err) if ctx.coordinator.is_running() => {
                        warn!(
                            connection = connections,
                            error = %err,
                            "platform link: connection lost"
                        );
                        err
                    }
                    _ => return LinkOutcome::Stopped,
                }
            }
        };

        let Some(delay) = backoff.next_delay() else {
            return escalate(&ctx, Endpoint::Platform, failure).await;
        };
        info!(attempt = backoff.failures(), ?delay, "platform link: reconnecting");
        if !sleep_or_shutdown(&ctx.coordinator, delay).await {
            return LinkOutcome::Stopped;
        }
    }
}
