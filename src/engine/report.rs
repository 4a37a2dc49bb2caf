//! Run report: money totals and counts across all batches of a run.

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::info;

use crate::strategy::anomaly::FilterStats;
use crate::strategy::BatchOutcome;
use crate::types::TicketType;

// ---------------------------------------------------------------------------
// Per-ticket summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    pub ticket_type: TicketType,
    pub staked: usize,
    pub suppressed: usize,
    pub total_stake: Decimal,
    /// `Σ stake × ev` over staked slips.
    pub expected_profit: Decimal,
    /// Mean EV over every emitted slip (0 if none).
    pub average_ev: f64,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub props_in: usize,
    pub props_after_filter: usize,
    pub tickets: Vec<TicketSummary>,
    pub bankroll: Decimal,
    pub timestamp: chrono::DateTime<Utc>,
}

impl BatchReport {
    pub fn build(filter: &FilterStats, outcomes: &[BatchOutcome], bankroll: f64) -> Self {
        let tickets = outcomes.iter().map(summarise).collect();
        Self {
            props_in: filter.input,
            props_after_filter: filter.output,
            tickets,
            bankroll: to_cents(bankroll),
            timestamp: Utc::now(),
        }
    }

    pub fn total_stake(&self) -> Decimal {
        self.tickets.iter().map(|t| t.total_stake).sum()
    }

    pub fn expected_profit(&self) -> Decimal {
        self.tickets.iter().map(|t| t.expected_profit).sum()
    }

    /// Share of the bankroll committed by this run.
    pub fn exposure(&self) -> Decimal {
        if self.bankroll <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.total_stake() / self.bankroll).round_dp(4)
    }

    pub fn log(&self) {
        for t in &self.tickets {
            info!(
                ticket_type = %t.ticket_type,
                staked = t.staked,
                suppressed = t.suppressed,
                total_stake = format!("${}", t.total_stake),
                expected_profit = format!("${}", t.expected_profit),
                avg_ev = format!("{:.2}%", t.average_ev * 100.0),
                "Ticket summary"
            );
        }
        info!(
            props_in = self.props_in,
            props_after_filter = self.props_after_filter,
            total_stake = format!("${}", self.total_stake()),
            expected_profit = format!("${}", self.expected_profit()),
            exposure = format!("{}%", self.exposure() * dec!(100)),
            "Run complete"
        );
    }
}

fn summarise(outcome: &BatchOutcome) -> TicketSummary {
    let total_stake: Decimal = outcome
        .staked
        .iter()
        .map(|s| to_cents(s.stake.unwrap_or(0.0)))
        .sum();
    let expected_profit: Decimal = outcome
        .staked
        .iter()
        .map(|s| to_cents(s.expected_profit()))
        .sum();
    let emitted: Vec<f64> = outcome.all_slips().map(|s| s.ev).collect();
    let average_ev = if emitted.is_empty() {
        0.0
    } else {
        emitted.iter().sum::<f64>() / emitted.len() as f64
    };

    TicketSummary {
        ticket_type: outcome.ticket_type,
        staked: outcome.staked.len(),
        suppressed: outcome.suppressed.len(),
        total_stake,
        expected_profit,
        average_ev,
    }
}

fn to_cents(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(2)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
