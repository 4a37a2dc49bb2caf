//! Slip construction by bounded beam search.
//!
//! Repeatedly searches the prop pool for the single best positive-EV slip,
//! emits it, and charges its legs against a per-prop reuse cap until the
//! target count is reached or nothing profitable is left.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::ev::{EvCalculator, MAX_LEGS, MIN_LEGS};
use crate::types::{Prop, Slip, TicketType};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Partial slips kept per expansion step.
    pub beam_width: usize,
    /// Maximum number of slips a single prop may appear in per batch.
    pub max_per_prop: usize,
    /// Maximum beam searches per batch (`None` = unbounded).
    pub max_rounds: Option<usize>,
    /// Wall-clock budget per batch (`None` = unbounded).
    pub time_budget: Option<Duration>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            beam_width: 50,
            max_per_prop: 3,
            max_rounds: None,
            time_budget: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Usage counters
// ---------------------------------------------------------------------------

/// How many emitted slips each prop appears in. One per batch; never shared
/// between concurrently running batches.
#[derive(Debug, Clone, Default)]
pub struct PropUsage {
    counts: HashMap<String, usize>,
}

impl PropUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, prop_id: &str) -> usize {
        self.counts.get(prop_id).copied().unwrap_or(0)
    }

    pub fn record(&mut self, slip: &Slip) {
        for prop in &slip.props {
            *self.counts.entry(prop.id.clone()).or_insert(0) += 1;
        }
    }

    pub fn max_count(&self) -> usize {
        self.counts.values().copied().max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Batch results
// ---------------------------------------------------------------------------

/// Why a batch stopped. All of these are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    /// Fewer than `MIN_LEGS` props still under the reuse cap.
    PoolExhausted,
    NoPositiveEv,
    RoundBudget,
    TimeBudget,
}

#[derive(Debug, Clone)]
pub struct BatchResult {
    pub ticket_type: TicketType,
    pub slips: Vec<Slip>,
    pub stop_reason: StopReason,
    pub rounds: usize,
}

/// POWER and FLEX slips built from the same board.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    pub power: Vec<Slip>,
    pub flex: Vec<Slip>,
}

impl Portfolio {
    pub fn len(&self) -> usize {
        self.power.len() + self.flex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slips(&self) -> impl Iterator<Item = &Slip> {
        self.power.iter().chain(self.flex.iter())
    }
}

/// Best slip found by one beam search: indices into the pool plus its EV.
#[derive(Debug, Clone)]
struct Candidate {
    legs: Vec<usize>,
    ev: f64,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
    calculator: EvCalculator,
}

impl PortfolioOptimizer {
    pub fn new(config: OptimizerConfig, calculator: EvCalculator) -> Self {
        Self { config, calculator }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn calculator(&self) -> &EvCalculator {
        &self.calculator
    }

    /// Build up to `target` slips with fresh usage counters.
    pub fn generate_slips(&self, props: &[Prop], ticket_type: TicketType, target: usize) -> Vec<Slip> {
        let mut usage = PropUsage::new();
        self.run_batch(props, ticket_type, target, &mut usage).slips
    }

    /// Run POWER and FLEX batches over the same board, each with its own counters.
    pub fn optimize_portfolio(&self, props: &[Prop], power_target: usize, flex_target: usize) -> Portfolio {
        Portfolio {
            power: self.generate_slips(props, TicketType::Power, power_target),
            flex: self.generate_slips(props, TicketType::Flex, flex_target),
        }
    }

    /// Run one batch against caller-owned usage counters.
    pub fn run_batch(
        &self,
        props: &[Prop],
        ticket_type: TicketType,
        target: usize,
        usage: &mut PropUsage,
    ) -> BatchResult {
        let started = Instant::now();
        let pool = unique_by_id(props);
        let stamp = Utc::now();
        let stamp_str = stamp.format("%Y%m%d_%H%M%S").to_string();

        let mut slips: Vec<Slip> = Vec::new();
        let mut rounds = 0;

        let stop_reason = loop {
            if slips.len() >= target {
                break StopReason::TargetReached;
            }
            if self.config.max_rounds.is_some_and(|max| rounds >= max) {
                break StopReason::RoundBudget;
            }
            if self.config.time_budget.is_some_and(|budget| started.elapsed() >= budget) {
                break StopReason::TimeBudget;
            }

            let available: Vec<&Prop> = pool
                .iter()
                .copied()
                .filter(|p| usage.count(&p.id) < self.config.max_per_prop)
                .collect();
            if available.len() < MIN_LEGS {
                break StopReason::PoolExhausted;
            }

            rounds += 1;
            let Some(best) = self.beam_search(&available, ticket_type) else {
                break StopReason::NoPositiveEv;
            };

            let slip = Slip {
                slip_id: format!("{}_{}_{:03}", ticket_type, stamp_str, slips.len() + 1),
                ticket_type,
                props: best.legs.iter().map(|&i| available[i].clone()).collect(),
                ev: best.ev,
                stake: None,
                created_at: stamp,
            };
            usage.record(&slip);
            debug!(
                slip_id = %slip.slip_id,
                legs = slip.n_props(),
                ev = format!("{:.2}%", slip.ev * 100.0),
                props = ?slip.prop_ids(),
                "Slip selected"
            );
            slips.push(slip);
        };

        info!(
            ticket_type = %ticket_type,
            pool = pool.len(),
            target,
            emitted = slips.len(),
            rounds,
            stop = ?stop_reason,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch complete"
        );

        BatchResult {
            ticket_type,
            slips,
            stop_reason,
            rounds,
        }
    }

    /// Find the best positive-EV slip in `available`, if any.
    ///
    /// States are ordered leg lists. Each step extends every state by every
    /// unused prop, so the same leg set may occupy several slots in
    /// different orders. States of `MIN_LEGS`+ legs are scored and the top
    /// `beam_width` survive (stable, so the first-found state wins ties).
    /// Shorter states are unscored and kept in generation order.
    fn beam_search(&self, available: &[&Prop], ticket_type: TicketType) -> Option<Candidate> {
        let probs: Vec<f64> = available.iter().map(|p| p.hit_probability).collect();
        let mut beam: Vec<Vec<usize>> = vec![Vec::new()];
        let mut best: Option<Candidate> = None;

        for size in 1..=MAX_LEGS {
            let mut next: Vec<(Vec<usize>, f64)> = Vec::new();

            for state in &beam {
                for idx in 0..available.len() {
                    if state.contains(&idx) {
                        continue;
                    }
                    let mut legs = state.clone();
                    legs.push(idx);

                    let score = if size >= MIN_LEGS {
                        let leg_probs: Vec<f64> = legs.iter().map(|&i| probs[i]).collect();
                        let ev = self.calculator.ev_from_probs(ticket_type, &leg_probs);
                        if let Some(value) = ev.selectable() {
                            if best.as_ref().map_or(true, |b| value > b.ev) {
                                best = Some(Candidate {
                                    legs: legs.clone(),
                                    ev: value,
                                });
                            }
                        }
                        ev.value()
                    } else {
                        0.0
                    };
                    next.push((legs, score));
                }
            }

            if size >= MIN_LEGS {
                next.sort_by(|a, b| b.1.total_cmp(&a.1));
            }
            next.truncate(self.config.beam_width);
            if next.is_empty() {
                break;
            }
            beam = next.into_iter().map(|(legs, _)| legs).collect();
        }

        best
    }
}

/// Drop props whose ID was already seen, keeping the first.
fn unique_by_id(props: &[Prop]) -> Vec<&Prop> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut pool = Vec::with_capacity(props.len());
    for prop in props {
        if seen.insert(prop.id.as_str()) {
            pool.push(prop);
        } else {
            warn!(prop_id = %prop.id, "Duplicate prop ID dropped from pool");
        }
    }
    pool
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
