//! Batch runner. Fans independent optimization batches out to the
//! blocking thread pool.
//!
//! Batches share the immutable `SlipStrategy` and board through `Arc`s;
//! each one builds its own usage counters inside `SlipStrategy::run_batch`.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::info;

use crate::strategy::{BatchOutcome, BatchTargets, SlipStrategy};
use crate::types::{Prop, TicketType};

/// One unit of work for the pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchJob {
    pub ticket_type: TicketType,
    pub target: usize,
    pub bankroll: f64,
}

impl BatchJob {
    /// One POWER and one FLEX job for the given targets.
    pub fn for_targets(targets: BatchTargets, bankroll: f64) -> Vec<BatchJob> {
        TicketType::ALL
            .iter()
            .map(|&ticket_type| BatchJob {
                ticket_type,
                target: targets.for_ticket(ticket_type),
                bankroll,
            })
            .collect()
    }
}

/// Run every job concurrently; outcomes come back in job order.
pub async fn run_parallel(
    strategy: Arc<SlipStrategy>,
    board: Arc<Vec<Prop>>,
    jobs: Vec<BatchJob>,
) -> Result<Vec<BatchOutcome>> {
    let job_count = jobs.len();
    let handles = jobs.into_iter().map(|job| {
        let strategy = Arc::clone(&strategy);
        let board = Arc::clone(&board);
        tokio::task::spawn_blocking(move || {
            strategy.run_batch(&board, job.ticket_type, job.target, job.bankroll)
        })
    });

    let mut outcomes = Vec::with_capacity(job_count);
    for joined in join_all(handles).await {
        outcomes.push(joined.context("Batch worker panicked")?);
    }

    info!(
        batches = outcomes.len(),
        slips = outcomes.iter().map(|o| o.staked.len() + o.suppressed.len()).sum::<usize>(),
        "All batches complete"
    );
    Ok(outcomes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
