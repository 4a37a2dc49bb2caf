//! Shared types for SLIPGRID.
//!
//! These types form the data model used across all modules: the props on
//! a board, the slips built from them, and the domain error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Prop
// ---------------------------------------------------------------------------

/// A single player-statistic proposition on the board.
///
/// `hit_probability` comes from an upstream model and is treated as an
/// independent-event probability that the "over" side resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub id: String,
    pub player: String,
    pub prop_type: String,
    pub line: f64,
    pub hit_probability: f64,
    /// Contextual tag consumed only by the bankroll optimizer.
    #[serde(default = "default_phase")]
    pub phase: String,
}

fn default_phase() -> String {
    "unknown".to_string()
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} o{} (p={:.1}% | {})",
            self.id,
            self.player,
            self.prop_type,
            self.line,
            self.hit_probability * 100.0,
            self.phase,
        )
    }
}

impl Prop {
    /// Build a prop, rejecting probabilities outside [0, 1] and non-finite lines.
    pub fn new(
        id: impl Into<String>,
        player: impl Into<String>,
        prop_type: impl Into<String>,
        line: f64,
        hit_probability: f64,
        phase: impl Into<String>,
    ) -> Result<Self, SlipError> {
        let prop = Self {
            id: id.into(),
            player: player.into(),
            prop_type: prop_type.into(),
            line,
            hit_probability,
            phase: phase.into(),
        };
        prop.validate()?;
        Ok(prop)
    }

    /// Check the numeric fields of a prop that arrived through deserialization.
    pub fn validate(&self) -> Result<(), SlipError> {
        if !self.line.is_finite() {
            return Err(SlipError::InvalidProp {
                id: self.id.clone(),
                reason: format!("line is not finite: {}", self.line),
            });
        }
        if !(0.0..=1.0).contains(&self.hit_probability) {
            return Err(SlipError::InvalidProp {
                id: self.id.clone(),
                reason: format!("hit probability outside [0, 1]: {}", self.hit_probability),
            });
        }
        Ok(())
    }

    /// Grouping key used to detect alternate lines.
    pub fn group_key(&self) -> (&str, &str) {
        (self.player.as_str(), self.prop_type.as_str())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Ticket payout structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketType {
    /// Every leg must hit; flat multiplier keyed by leg count.
    Power,
    /// Tiered multipliers for partial hits.
    Flex,
}

impl TicketType {
    pub const ALL: &'static [TicketType] = &[TicketType::Power, TicketType::Flex];
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketType::Power => write!(f, "POWER"),
            TicketType::Flex => write!(f, "FLEX"),
        }
    }
}

impl std::str::FromStr for TicketType {
    type Err = SlipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "power" => Ok(TicketType::Power),
            "flex" => Ok(TicketType::Flex),
            other => Err(SlipError::Config(format!("unknown ticket type: {other}"))),
        }
    }
}

/// How a line relates to the other lines offered for the same player and stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineClass {
    Standard,
    /// Easier alternate (lower line, lower payout).
    Goblin,
    /// Harder alternate (higher line, higher payout).
    Demon,
}

impl fmt::Display for LineClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineClass::Standard => write!(f, "standard"),
            LineClass::Goblin => write!(f, "goblin"),
            LineClass::Demon => write!(f, "demon"),
        }
    }
}

// ---------------------------------------------------------------------------
// Slip
// ---------------------------------------------------------------------------

/// A multi-leg ticket emitted by the portfolio optimizer.
///
/// `stake` stays `None` until the bankroll optimizer has sized the slip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slip {
    pub slip_id: String,
    pub ticket_type: TicketType,
    pub props: Vec<Prop>,
    pub ev: f64,
    pub stake: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Slip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stake = match self.stake {
            Some(s) => format!("${s:.2}"),
            None => "unsized".to_string(),
        };
        write!(
            f,
            "{} {} {}-pick | EV {:+.2}% | stake {} | {}",
            self.slip_id,
            self.ticket_type,
            self.n_props(),
            self.ev * 100.0,
            stake,
            self.prop_ids().join(","),
        )
    }
}

impl Slip {
    pub fn n_props(&self) -> usize {
        self.props.len()
    }

    pub fn prop_ids(&self) -> Vec<&str> {
        self.props.iter().map(|p| p.id.as_str()).collect()
    }

    /// Phase used for sizing: the first leg's phase.
    pub fn phase(&self) -> &str {
        self.props
            .first()
            .map(|p| p.phase.as_str())
            .unwrap_or("unknown")
    }

    /// Whether the slip has been sized with a non-zero stake.
    pub fn is_staked(&self) -> bool {
        matches!(self.stake, Some(s) if s > 0.0)
    }

    /// Expected profit in currency units (`stake × ev`). Zero if unsized.
    pub fn expected_profit(&self) -> f64 {
        self.stake.unwrap_or(0.0) * self.ev
    }

    /// Helper to build a sample slip for tests.
    #[cfg(test)]
    pub fn sample() -> Self {
        let props = (0..3)
            .map(|i| Prop {
                id: format!("P{i:03}"),
                player: format!("Player {i}"),
                prop_type: "points".to_string(),
                line: 18.5,
                hit_probability: 0.6,
                phase: "luteal".to_string(),
            })
            .collect();
        Slip {
            slip_id: "POWER_20250701_190000_001".to_string(),
            ticket_type: TicketType::Power,
            props,
            ev: 0.296,
            stake: None,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SLIPGRID.
#[derive(Debug, thiserror::Error)]
pub enum SlipError {
    #[error("Invalid prop {id}: {reason}")]
    InvalidProp { id: String, reason: String },

    #[error("Invalid phase divisor for '{phase}': {divisor} (must be > 0)")]
    InvalidDivisor { phase: String, divisor: f64 },

    #[error("Phase divisor table has no 'unknown' entry")]
    MissingDefaultPhase,

    #[error("Invalid payout entry '{key}': {reason}")]
    InvalidPayout { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
