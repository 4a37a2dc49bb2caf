//! Strategy engine: line filtering, EV, slip search, and stake sizing.

pub mod anomaly;
pub mod ev;
pub mod kelly;
pub mod portfolio;

use tracing::{debug, info};

use crate::types::{Prop, Slip, TicketType};
use anomaly::{AnomalyFilter, FilterStats};
use kelly::BankrollOptimizer;
use portfolio::{PortfolioOptimizer, PropUsage, StopReason};

// ---------------------------------------------------------------------------
// Batch outcome
// ---------------------------------------------------------------------------

/// Requested slip counts per ticket type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchTargets {
    pub power: usize,
    pub flex: usize,
}

impl Default for BatchTargets {
    fn default() -> Self {
        Self { power: 5, flex: 5 }
    }
}

impl BatchTargets {
    pub fn for_ticket(&self, ticket_type: TicketType) -> usize {
        match ticket_type {
            TicketType::Power => self.power,
            TicketType::Flex => self.flex,
        }
    }
}

/// Sized result of one optimization batch.
///
/// Slips whose stake came out as 0 are kept apart in `suppressed` so the
/// caller can alert on `staked` only while still seeing what was passed on.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub ticket_type: TicketType,
    pub staked: Vec<Slip>,
    pub suppressed: Vec<Slip>,
    pub stop_reason: StopReason,
    pub rounds: usize,
}

impl BatchOutcome {
    /// Every emitted slip, staked first.
    pub fn all_slips(&self) -> impl Iterator<Item = &Slip> {
        self.staked.iter().chain(self.suppressed.iter())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Pipelines anomaly filtering → slip search → stake sizing.
///
/// Holds only immutable configuration, so one instance can serve several
/// batches at once; each batch gets its own usage counters.
pub struct SlipStrategy {
    filter: AnomalyFilter,
    optimizer: PortfolioOptimizer,
    bankroll: BankrollOptimizer,
}

impl SlipStrategy {
    pub fn new(filter: AnomalyFilter, optimizer: PortfolioOptimizer, bankroll: BankrollOptimizer) -> Self {
        Self {
            filter,
            optimizer,
            bankroll,
        }
    }

    pub fn optimizer(&self) -> &PortfolioOptimizer {
        &self.optimizer
    }

    pub fn bankroll_optimizer(&self) -> &BankrollOptimizer {
        &self.bankroll
    }

    /// Reduce a raw board to standard lines.
    pub fn prepare_board(&self, props: &[Prop]) -> (Vec<Prop>, FilterStats) {
        self.filter.filter_with_stats(props)
    }

    /// Build and size one batch from an already-filtered board.
    pub fn run_batch(&self, board: &[Prop], ticket_type: TicketType, target: usize, bankroll: f64) -> BatchOutcome {
        let mut usage = PropUsage::new();
        let result = self.optimizer.run_batch(board, ticket_type, target, &mut usage);

        let mut slips = result.slips;
        self.size_slips(&mut slips, bankroll);
        let (staked, suppressed): (Vec<Slip>, Vec<Slip>) = slips.into_iter().partition(Slip::is_staked);

        info!(
            ticket_type = %ticket_type,
            staked = staked.len(),
            suppressed = suppressed.len(),
            bankroll = format!("${:.2}", bankroll),
            "Batch sized"
        );

        BatchOutcome {
            ticket_type,
            staked,
            suppressed,
            stop_reason: result.stop_reason,
            rounds: result.rounds,
        }
    }

    /// Filter the board once, then run the POWER and FLEX batches in turn.
    pub fn run(&self, props: &[Prop], targets: BatchTargets, bankroll: f64) -> Vec<BatchOutcome> {
        let (board, _) = self.prepare_board(props);
        TicketType::ALL
            .iter()
            .map(|&ticket_type| self.run_batch(&board, ticket_type, targets.for_ticket(ticket_type), bankroll))
            .collect()
    }

    /// Assign a stake to every slip from its EV and first-leg phase.
    pub fn size_slips(&self, slips: &mut [Slip], bankroll: f64) {
        for slip in slips.iter_mut() {
            let stake = self.bankroll.size_bet(bankroll, slip.ev, slip.phase());
            debug!(
                slip_id = %slip.slip_id,
                phase = slip.phase(),
                stake = format!("${:.2}", stake),
                "Slip sized"
            );
            slip.stake = Some(stake);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
