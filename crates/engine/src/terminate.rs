use std::time::Duration;

use futures::future::join_all;
use resync_core::InstanceId;
use tracing::{info, warn};

use crate::host::{ForegroundRegistry, HostLifecycle};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerminationReport {
    pub acknowledged: Vec<InstanceId>,
    pub timed_out: Vec<InstanceId>,
    pub failed: Vec<(InstanceId, String)>,
    pub deregistered: bool,
    pub deregister_error: Option<String>,
}

enum Ack {
    Done,
    TimedOut,
    Failed(String),
}

/// Send every foreground instance to `neutral_url`, giving each `timeout` to
/// acknowledge, then deregister. Instances are handled independently; one
/// that never answers does not hold up the rest or the deregistration.
pub async fn terminate_all(
    registry: &dyn ForegroundRegistry,
    lifecycle: &dyn HostLifecycle,
    neutral_url: &str,
    timeout: Duration,
) -> TerminationReport {
    let instances = registry.instances().await;
    info!(instances = instances.len(), "terminating foreground instances");

    let acks = join_all(instances.iter().map(|instance| async move {
        let ack = match tokio::time::timeout(timeout, instance.navigate(neutral_url)).await {
            Ok(Ok(())) => Ack::Done,
            Ok(Err(e)) => Ack::Failed(e.to_string()),
            Err(_) => Ack::TimedOut,
        };
        (instance.id(), ack)
    }))
    .await;

    let mut report = TerminationReport::default();
    for (id, ack) in acks {
        match ack {
            Ack::Done => report.acknowledged.push(id),
            Ack::TimedOut => {
                warn!(instance = %id, timeout_ms = timeout.as_millis() as u64, "instance did not acknowledge terminate");
                report.timed_out.push(id);
            }
            Ack::Failed(e) => {
                warn!(instance = %id, error = %e, "instance failed to navigate");
                report.failed.push((id, e));
            }
        }
    }

    match lifecycle.deregister().await {
        Ok(done) => report.deregistered = done,
        Err(e) => {
            warn!(error = %e, "deregistration failed");
            report.deregister_error = Some(e.to_string());
        }
    }

    info!(
        acknowledged = report.acknowledged.len(),
        timed_out = report.timed_out.len(),
        failed = report.failed.len(),
        deregistered = report.deregistered,
        "terminate finished"
    );
    report
}
