//! [`LivenessSweeper`] – stale-process cleanup for the robot graph.
//!
//! Pings every known graph process and removes the unreachable ones from the
//! graph's record, so later enumeration cycles stop treating their entities
//! as live.  Runs on its own interval, independent of reconciliation, and
//! never touches the entity registries: nodes already mirrored for a stale
//! entity remain in the address space.

use std::sync::Arc;

use tracing::{debug, info};

use rosua_types::MirrorError;

use crate::source::GraphSource;

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Processes that answered the ping.
    pub reachable: usize,
    /// Processes that failed to answer and were removed from the record.
    pub purged: usize,
}

/// Periodic liveness sweep over the robot graph's process table.
pub struct LivenessSweeper {
    graph: Arc<dyn GraphSource>,
}

impl LivenessSweeper {
    pub fn new(graph: Arc<dyn GraphSource>) -> Self {
        Self { graph }
    }

    /// Ping all known processes and purge the unreachable set.
    ///
    /// # Errors
    ///
    /// Propagates [`MirrorError::Graph`] when the ping or the purge call
    /// itself fails; an unreachable process is not an error.
    pub async fn sweep(&self) -> Result<SweepReport, MirrorError> {
        let report = self.graph.ping_all().await?;
        if report.unreachable.is_empty() {
            debug!(reachable = report.reachable.len(), "sweep found no stale processes");
            return Ok(SweepReport {
                reachable: report.reachable.len(),
                purged: 0,
            });
        }

        let purged = self.graph.purge(&report.unreachable).await?;
        info!(
            reachable = report.reachable.len(),
            purged, "removed stale process records from the graph"
        );
        Ok(SweepReport {
            reachable: report.reachable.len(),
            purged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimGraph;

    #[tokio::test]
    async fn sweep_purges_exactly_the_unreachable_set() {
        let graph = Arc::new(SimGraph::new());
        graph.add_process("/teleop", true);
        graph.add_process("/camera_driver", true);
        graph.add_process("/crashed_planner", false);

        let sweeper = LivenessSweeper::new(Arc::clone(&graph) as Arc<dyn GraphSource>);
        let report = sweeper.sweep().await.unwrap();

        assert_eq!(report.reachable, 2);
        assert_eq!(report.purged, 1);
        assert_eq!(graph.process_count(), 2);
    }

    #[tokio::test]
    async fn sweep_with_all_reachable_purges_nothing() {
        let graph = Arc::new(SimGraph::new());
        graph.add_process("/teleop", true);

        let sweeper = LivenessSweeper::new(Arc::clone(&graph) as Arc<dyn GraphSource>);
        let report = sweeper.sweep().await.unwrap();

        assert_eq!(report, SweepReport { reachable: 1, purged: 0 });
        assert_eq!(graph.process_count(), 1);
    }

    #[tokio::test]
    async fn repeated_sweeps_are_stable() {
        let graph = Arc::new(SimGraph::new());
        graph.add_process("/alive", true);
        graph.add_process("/stale", false);

        let sweeper = LivenessSweeper::new(Arc::clone(&graph) as Arc<dyn GraphSource>);
        let first = sweeper.sweep().await.unwrap();
        let second = sweeper.sweep().await.unwrap();

        assert_eq!(first.purged, 1);
        assert_eq!(second.purged, 0);
    }
}
