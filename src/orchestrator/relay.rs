//! Relay wiring: queues, link supervisors, and the shutdown join.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::camelot::{ChildProcessSupervisor, LaunchPlan};
use crate::config::RelayConfig;
use crate::orchestrator::camelot_link::run_camelot_link;
use crate::orchestrator::platform_link::run_platform_link;
use crate::orchestrator::{LinkContext, LinkOutcome};
use crate::queue::{QueueProbe, RelayQueue};
use crate::shutdown::{ShutdownCoordinator, ShutdownReason};

/// Name of the Platform → Camelot queue.
pub const INBOUND_QUEUE: &str = "inbound";

/// Name of the Camelot → Platform queue.
pub const OUTBOUND_QUEUE: &str = "outbound";

/// A running relay: two link supervisors joined by two queues.
#[derive(Debug)]
pub struct Relay {
    run_id: Uuid,
    coordinator: ShutdownCoordinator,
    platform: JoinHandle<LinkOutcome>,
    camelot: JoinHandle<LinkOutcome>,
    inbound: QueueProbe,
    outbound: QueueProbe,
}

/// Final state of both links after [`Relay::join`].
#[derive(Debug)]
pub struct RelayReport {
    /// Platform link outcome; `None` if it had to be aborted or panicked.
    pub platform: Option<LinkOutcome>,
    /// Camelot link outcome; `None` if it had to be aborted or panicked.
    pub camelot: Option<LinkOutcome>,
    /// Reason recorded by the coordinator.
    pub reason: Option<ShutdownReason>,
}

impl RelayReport {
    /// Whether both links finished on their own within the grace period.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.platform.is_some() && self.camelot.is_some()
    }
}

impl Relay {
    /// Build both queues and spawn both link supervisors.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(config: &RelayConfig, coordinator: ShutdownCoordinator) -> Self {
        let run_id = Uuid::new_v4();
        let capacity = config.queues.capacity;

        let (inbound_tx, inbound_rx) = RelayQueue::bounded(INBOUND_QUEUE, capacity);
        let (outbound_tx, outbound_rx) = RelayQueue::bounded(OUTBOUND_QUEUE, capacity);
        let inbound = inbound_tx.probe();
        let outbound = outbound_tx.probe();

        let plan = LaunchPlan::for_current_os(&config.camelot);
        info!(
            %run_id,
            platform = %config.platform.address,
            camelot = %plan.display_line(),
            queue_capacity = capacity,
            "relay starting"
        );

        let platform_ctx = LinkContext {
            coordinator: coordinator.clone(),
            policy: config.restart.platform.clone(),
        };
        let platform = tokio::spawn(
            run_platform_link(
                config.platform.clone(),
                config.connect_timeout(),
                platform_ctx,
                inbound_tx,
                outbound_rx,
            )
            .instrument(info_span!("platform_link", %run_id)),
        );

        let camelot_ctx = LinkContext {
            coordinator: coordinator.clone(),
            policy: config.restart.camelot.clone(),
        };
        let supervisor = ChildProcessSupervisor::new(plan, config.child_exit_grace());
        let camelot = tokio::spawn(
            run_camelot_link(supervisor, camelot_ctx, outbound_tx, inbound_rx)
                .instrument(info_span!("camelot_link", %run_id)),
        );

        Self {
            run_id,
            coordinator,
            platform,
            camelot,
            inbound,
            outbound,
        }
    }

    /// Identifier attached to this run's log spans.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Shutdown handle shared with the links.
    #[must_use]
    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// Platform → Camelot messages waiting for the Camelot sender.
    #[must_use]
    pub fn inbound_depth(&self) -> Option<usize> {
        self.inbound.depth()
    }

    /// Camelot → Platform messages waiting for the Platform sender.
    #[must_use]
    pub fn outbound_depth(&self) -> Option<usize> {
        self.outbound.depth()
    }

    /// Wait for shutdown to be requested, then give both links `grace` to
    /// finish. A link still running after that is aborted and reported as
    /// `None`; the other link's outcome is kept.
    pub async fn join(self, grace: Duration) -> RelayReport {
        let Self {
            coordinator,
            platform,
            camelot,
            ..
        } = self;

        coordinator.cancelled().await;

        let deadline = Instant::now() + grace;
        let (platform, camelot) = tokio::join!(
            settle("platform", platform, deadline),
            settle("camelot", camelot, deadline),
        );

        let report = RelayReport {
            platform,
            camelot,
            reason: coordinator.reason(),
        };
        info!(
            platform = ?report.platform,
            camelot = ?report.camelot,
            "relay stopped"
        );
        report
    }
}

/// Await one link until `deadline`, aborting it if it is still running.
async fn settle(
    link: &'static str,
    mut handle: JoinHandle<LinkOutcome>,
    deadline: Instant,
) -> Option<LinkOutcome> {
    match tokio::time::timeout_at(deadline, &mut handle).await {
        Ok(joined) => joined.ok(),
        Err(_elapsed) => {
            warn!(link, "link did not stop within the grace period, aborting");
            handle.abort();
            None
        }
    }
}
