//! Phase-aware fractional Kelly stake sizing.
//!
//! Turns a slip's EV into a stake: `bankroll × ev / divisor`, where the
//! divisor depends on the slip's phase tag, capped at a fraction of the
//! bankroll and suppressed entirely below a minimum bet.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, warn};

use crate::types::SlipError;

/// Key of the mandatory fallback divisor.
pub const UNKNOWN_PHASE: &str = "unknown";

// ---------------------------------------------------------------------------
// Phase divisors
// ---------------------------------------------------------------------------

/// Kelly divisor per phase. Every divisor is strictly positive and an
/// `"unknown"` entry is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseDivisorTable {
    divisors: HashMap<String, f64>,
}

impl Default for PhaseDivisorTable {
    fn default() -> Self {
        let divisors = [
            ("follicular", 4.0),
            ("ovulatory", 3.0),
            ("luteal", 5.0),
            ("menstrual", 6.0),
            (UNKNOWN_PHASE, 5.0),
        ]
        .into_iter()
        .map(|(phase, d)| (phase.to_string(), d))
        .collect();
        Self { divisors }
    }
}

impl PhaseDivisorTable {
    /// Validate and build a table. Phase names are matched case-insensitively.
    pub fn new(entries: impl IntoIterator<Item = (String, f64)>) -> Result<Self, SlipError> {
        let mut divisors = HashMap::new();
        for (phase, divisor) in entries {
            if !divisor.is_finite() || divisor <= 0.0 {
                return Err(SlipError::InvalidDivisor { phase, divisor });
            }
            divisors.insert(phase.to_lowercase(), divisor);
        }
        if !divisors.contains_key(UNKNOWN_PHASE) {
            return Err(SlipError::MissingDefaultPhase);
        }
        Ok(Self { divisors })
    }

    /// Load `{"<phase>": divisor, ..., "unknown": divisor}` from JSON.
    ///
    /// A missing or unparseable file falls back to the defaults with a
    /// warning; bad divisors are rejected here rather than at sizing time.
    pub fn load(path: &Path) -> Result<Self, SlipError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Phase divisors unreadable, using defaults");
                return Ok(Self::default());
            }
        };
        let raw: HashMap<String, f64> = match serde_json::from_str(&contents) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Phase divisors are not valid JSON, using defaults");
                return Ok(Self::default());
            }
        };
        Self::new(raw)
    }

    /// Divisor for `phase`, falling back to the `"unknown"` entry.
    pub fn divisor(&self, phase: &str) -> f64 {
        self.divisors
            .get(&phase.to_lowercase())
            .or_else(|| self.divisors.get(UNKNOWN_PHASE))
            .copied()
            // `new` guarantees the unknown entry; 5.0 mirrors the default table.
            .unwrap_or(5.0)
    }

    pub fn phases(&self) -> impl Iterator<Item = &str> {
        self.divisors.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Batch-wide bet limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetConstraints {
    /// Minimum stake in currency units; smaller stakes are not placed.
    pub min_bet: f64,
    /// Maximum stake as a fraction of bankroll (0–1).
    pub max_bet_pct: f64,
}

impl Default for BetConstraints {
    fn default() -> Self {
        Self {
            min_bet: 5.0,
            max_bet_pct: 0.10,
        }
    }
}

impl BetConstraints {
    /// Clamp `min_bet` to ≥ 0 and `max_bet_pct` to [0, 1].
    pub fn new(min_bet: f64, max_bet_pct: f64) -> Self {
        let clamped = Self {
            min_bet: min_bet.max(0.0),
            max_bet_pct: max_bet_pct.clamp(0.0, 1.0),
        };
        if clamped.min_bet != min_bet || clamped.max_bet_pct != max_bet_pct {
            warn!(
                min_bet,
                max_bet_pct,
                clamped_min = clamped.min_bet,
                clamped_max = clamped.max_bet_pct,
                "Bet constraints clamped"
            );
        }
        clamped
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Immutable sizing context for one batch.
#[derive(Debug, Clone, Default)]
pub struct BankrollOptimizer {
    divisors: PhaseDivisorTable,
    constraints: BetConstraints,
}

impl BankrollOptimizer {
    pub fn new(divisors: PhaseDivisorTable, constraints: BetConstraints) -> Self {
        Self {
            divisors,
            constraints,
        }
    }

    pub fn constraints(&self) -> &BetConstraints {
        &self.constraints
    }

    pub fn divisors(&self) -> &PhaseDivisorTable {
        &self.divisors
    }

    /// Kelly fraction before caps: `ev / divisor(phase)`, 0 for non-positive EV.
    pub fn kelly_fraction(&self, ev: f64, phase: &str) -> f64 {
        if ev <= 0.0 {
            return 0.0;
        }
        ev / self.divisors.divisor(phase)
    }

    /// Stake for a slip with the given EV and phase.
    ///
    /// Returns 0 for a non-positive bankroll or EV and for stakes under
    /// `min_bet`; otherwise the stake capped at `bankroll × max_bet_pct`,
    /// rounded to cents.
    pub fn size_bet(&self, bankroll: f64, ev: f64, phase: &str) -> f64 {
        if bankroll <= 0.0 || ev <= 0.0 || !ev.is_finite() {
            return 0.0;
        }

        let kelly = self.kelly_fraction(ev, phase);
        let raw_stake = bankroll * kelly;
        let max_stake = bankroll * self.constraints.max_bet_pct;
        let stake = raw_stake.min(max_stake);

        if stake < self.constraints.min_bet {
            debug!(
                phase,
                stake = format!("${:.2}", stake),
                min = self.constraints.min_bet,
                "Stake below minimum, not betting"
            );
            return 0.0;
        }

        let rounded = round_cents(stake, max_stake);
        if rounded < self.constraints.min_bet {
            return 0.0;
        }

        debug!(
            phase,
            ev = format!("{:.2}%", ev * 100.0),
            kelly = format!("{:.3}%", kelly * 100.0),
            capped = raw_stake > max_stake,
            stake = format!("${:.2}", rounded),
            "Bet sized"
        );
        rounded
    }
}

/// Round to cents (half to even), never exceeding `cap`.
fn round_cents(stake: f64, cap: f64) -> f64 {
    let Some(value) = Decimal::from_f64(stake) else {
        return 0.0;
    };
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    if rounded.to_f64().unwrap_or(0.0) > cap {
        rounded = value.round_dp_with_strategy(2, RoundingStrategy::ToZero);
    }
    rounded.to_f64().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
