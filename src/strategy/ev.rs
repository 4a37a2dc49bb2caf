//! Ticket expected value.
//!
//! Computes exact EV for POWER (all legs hit) and FLEX (tiered partial
//! hits) tickets from independent per-leg hit probabilities and a payout
//! table. Legs are assumed independent.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{Prop, SlipError, TicketType};

/// Smallest ticket the payout tables cover.
pub const MIN_LEGS: usize = 3;
/// Largest ticket the payout tables cover.
pub const MAX_LEGS: usize = 6;

// ---------------------------------------------------------------------------
// Payout table
// ---------------------------------------------------------------------------

/// Payout multipliers per ticket structure. Missing entries pay nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutTable {
    /// Leg count → multiplier when every leg hits.
    power: BTreeMap<usize, f64>,
    /// `(hits, legs)` → multiplier for exactly `hits` of `legs` hitting.
    flex: BTreeMap<(usize, usize), f64>,
}

/// On-disk shape: `{"power": {"3": 10.0}, "flex": {"3_of_3": 5.0}}`.
#[derive(Debug, Deserialize, Default)]
struct RawPayoutTable {
    #[serde(default)]
    power: HashMap<String, f64>,
    #[serde(default)]
    flex: HashMap<String, f64>,
}

impl Default for PayoutTable {
    fn default() -> Self {
        let power = [(3, 10.0), (4, 20.0), (5, 40.0), (6, 100.0)]
            .into_iter()
            .collect();
        let flex = [
            ((3, 3), 5.0),
            ((3, 4), 2.5),
            ((4, 4), 10.0),
            ((4, 5), 4.0),
            ((5, 5), 20.0),
            ((5, 6), 10.0),
            ((6, 6), 40.0),
        ]
        .into_iter()
        .collect();
        Self { power, flex }
    }
}

impl PayoutTable {
    /// Build a table from explicit entries.
    pub fn new(
        power: impl IntoIterator<Item = (usize, f64)>,
        flex: impl IntoIterator<Item = ((usize, usize), f64)>,
    ) -> Self {
        Self {
            power: power.into_iter().collect(),
            flex: flex.into_iter().collect(),
        }
    }

    /// Load from a JSON file.
    ///
    /// A missing or unparseable file falls back to the built-in defaults with
    /// a warning. Entries that parse but make no sense (negative multipliers,
    /// malformed tier keys) are rejected.
    pub fn load(path: &Path) -> Result<Self, SlipError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Payout table unreadable, using defaults");
                return Ok(Self::default());
            }
        };
        let raw: RawPayoutTable = match serde_json::from_str(&contents) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Payout table is not valid JSON, using defaults");
                return Ok(Self::default());
            }
        };
        Self::from_raw(raw)
    }

    /// Parse a JSON document strictly (syntax errors are errors too).
    pub fn from_json_str(json: &str) -> Result<Self, SlipError> {
        let raw: RawPayoutTable = serde_json::from_str(json)
            .map_err(|e| SlipError::Config(format!("payout table: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawPayoutTable) -> Result<Self, SlipError> {
        let mut power = BTreeMap::new();
        for (key, multiplier) in raw.power {
            check_multiplier(&key, multiplier)?;
            let legs: usize = key.trim().parse().map_err(|_| SlipError::InvalidPayout {
                key: key.clone(),
                reason: "power keys must be leg counts".into(),
            })?;
            power.insert(legs, multiplier);
        }

        let mut flex = BTreeMap::new();
        for (key, multiplier) in raw.flex {
            check_multiplier(&key, multiplier)?;
            let tier = parse_tier_key(&key).ok_or_else(|| SlipError::InvalidPayout {
                key: key.clone(),
                reason: "flex keys must look like '<hits>_of_<legs>' with hits <= legs".into(),
            })?;
            flex.insert(tier, multiplier);
        }

        Ok(Self { power, flex })
    }

    /// POWER multiplier for `legs` legs (0 if absent).
    pub fn power(&self, legs: usize) -> f64 {
        self.power.get(&legs).copied().unwrap_or(0.0)
    }

    /// FLEX multiplier for exactly `hits` of `legs` (0 if absent).
    pub fn flex(&self, hits: usize, legs: usize) -> f64 {
        self.flex.get(&(hits, legs)).copied().unwrap_or(0.0)
    }

    /// Headline decimal odds of a ticket: the payout when every leg hits.
    pub fn decimal_odds(&self, ticket_type: TicketType, legs: usize) -> f64 {
        match ticket_type {
            TicketType::Power => self.power(legs),
            TicketType::Flex => self.flex(legs, legs),
        }
    }
}

fn check_multiplier(key: &str, multiplier: f64) -> Result<(), SlipError> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(SlipError::InvalidPayout {
            key: key.to_string(),
            reason: format!("multiplier must be a non-negative number, got {multiplier}"),
        });
    }
    Ok(())
}

/// `"4_of_5"` → `(4, 5)`.
fn parse_tier_key(key: &str) -> Option<(usize, usize)> {
    let (hits, legs) = key.trim().split_once("_of_")?;
    let hits: usize = hits.parse().ok()?;
    let legs: usize = legs.parse().ok()?;
    (hits <= legs).then_some((hits, legs))
}

// ---------------------------------------------------------------------------
// EV result
// ---------------------------------------------------------------------------

/// Outcome of an EV calculation.
///
/// Invalid ticket sizes get their own variant instead of a magic negative
/// number; [`TicketEv::value`] still maps them to `-1.0` for callers that
/// only deal in floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TicketEv {
    Valid(f64),
    /// Leg count outside `MIN_LEGS..=MAX_LEGS`.
    InvalidSize(usize),
}

impl TicketEv {
    pub const INVALID_SENTINEL: f64 = -1.0;

    pub fn value(&self) -> f64 {
        match self {
            TicketEv::Valid(ev) => *ev,
            TicketEv::InvalidSize(_) => Self::INVALID_SENTINEL,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TicketEv::Valid(_))
    }

    /// The EV if this ticket may be selected (valid and strictly positive).
    pub fn selectable(&self) -> Option<f64> {
        match self {
            TicketEv::Valid(ev) if *ev > 0.0 => Some(*ev),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EvCalculator {
    payouts: PayoutTable,
}

impl EvCalculator {
    pub fn new(payouts: PayoutTable) -> Self {
        Self { payouts }
    }

    pub fn payouts(&self) -> &PayoutTable {
        &self.payouts
    }

    /// EV of a ticket of the given type.
    pub fn ev(&self, ticket_type: TicketType, props: &[Prop]) -> TicketEv {
        let probs: Vec<f64> = props.iter().map(|p| p.hit_probability).collect();
        self.ev_from_probs(ticket_type, &probs)
    }

    pub fn ev_from_probs(&self, ticket_type: TicketType, probs: &[f64]) -> TicketEv {
        match ticket_type {
            TicketType::Power => self.power_ev_from_probs(probs),
            TicketType::Flex => self.flex_ev_from_probs(probs),
        }
    }

    /// POWER EV: `multiplier(n) × Π p_i − 1`.
    pub fn power_ev(&self, props: &[Prop]) -> TicketEv {
        self.ev(TicketType::Power, props)
    }

    /// FLEX EV: `Σ_k multiplier(k, n) × P(exactly k) − 1` over tiers `k = n..=2`.
    pub fn flex_ev(&self, props: &[Prop]) -> TicketEv {
        self.ev(TicketType::Flex, props)
    }

    pub fn power_ev_from_probs(&self, probs: &[f64]) -> TicketEv {
        let n = probs.len();
        if !(MIN_LEGS..=MAX_LEGS).contains(&n) {
            return TicketEv::InvalidSize(n);
        }
        let combined: f64 = probs.iter().product();
        TicketEv::Valid(self.payouts.power(n) * combined - 1.0)
    }

    pub fn flex_ev_from_probs(&self, probs: &[f64]) -> TicketEv {
        let n = probs.len();
        if !(MIN_LEGS..=MAX_LEGS).contains(&n) {
            return TicketEv::InvalidSize(n);
        }
        let mut total = 0.0;
        for hits in (2..=n).rev() {
            let payout = self.payouts.flex(hits, n);
            if payout <= 0.0 {
                continue;
            }
            let p_exact = prob_exactly(probs, hits);
            debug!(hits, legs = n, payout, p_exact, "FLEX tier");
            total += payout * p_exact;
        }
        TicketEv::Valid(total - 1.0)
    }
}

/// `P(exactly k legs hit)` by enumerating every subset of size `k`.
///
/// Only tickets of up to `MAX_LEGS` legs are enumerated; longer slices and
/// `k > n` give 0.
pub fn prob_exactly(probs: &[f64], k: usize) -> f64 {
    let n = probs.len();
    if n > MAX_LEGS || k > n {
        return 0.0;
    }
    (0u32..(1u32 << n))
        .filter(|mask| mask.count_ones() as usize == k)
        .map(|mask| {
            probs
                .iter()
                .enumerate()
                .map(|(i, p)| if mask & (1 << i) != 0 { *p } else { 1.0 - *p })
                .product::<f64>()
        })
        .sum()
}

/// `P(exactly k)` for every `k` in `0..=n`; empty past `MAX_LEGS` legs.
pub fn hit_distribution(probs: &[f64]) -> Vec<f64> {
    if probs.len() > MAX_LEGS {
        return Vec::new();
    }
    (0..=probs.len()).map(|k| prob_exactly(probs, k)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
