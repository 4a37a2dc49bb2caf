//! File I/O glue.
//!
//! Reads the prop board handed over by the upstream models and writes the
//! sized slips for the downstream orchestrator, both as JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::strategy::ev::PayoutTable;
use crate::types::{Prop, Slip, SlipError, TicketType};

/// Output record for one slip.
#[derive(Debug, Serialize)]
pub struct SlipRecord<'a> {
    pub slip_id: &'a str,
    pub ticket_type: TicketType,
    pub props: &'a [Prop],
    pub ev: f64,
    pub stake: f64,
    pub n_props: usize,
    pub phase: &'a str,
    /// Payout multiplier when every leg hits.
    pub decimal_odds: f64,
    pub created_at: DateTime<Utc>,
}

impl<'a> SlipRecord<'a> {
    pub fn new(slip: &'a Slip, payouts: &PayoutTable) -> Self {
        Self {
            slip_id: &slip.slip_id,
            ticket_type: slip.ticket_type,
            props: &slip.props,
            ev: slip.ev,
            stake: slip.stake.unwrap_or(0.0),
            n_props: slip.n_props(),
            phase: slip.phase(),
            decimal_odds: payouts.decimal_odds(slip.ticket_type, slip.n_props()),
            created_at: slip.created_at,
        }
    }
}

/// Load a JSON array of props, rejecting any with invalid numbers.
pub fn load_props(path: &Path) -> Result<Vec<Prop>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read props from {}", path.display()))?;
    let props: Vec<Prop> = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse props from {}", path.display()))?;

    for prop in &props {
        prop.validate()
            .with_context(|| format!("Invalid prop in {}", path.display()))?;
    }

    info!(path = %path.display(), count = props.len(), "Props loaded");
    Ok(props)
}

/// Write slips as a pretty-printed JSON array of [`SlipRecord`]s.
pub fn save_slips<'a>(
    slips: impl IntoIterator<Item = &'a Slip>,
    payouts: &PayoutTable,
    path: &Path,
) -> Result<usize> {
    let records: Vec<SlipRecord<'_>> = slips
        .into_iter()
        .map(|slip| SlipRecord::new(slip, payouts))
        .collect();
    let json = serde_json::to_string_pretty(&records).context("Failed to serialise slips")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| SlipError::Storage(format!("{}: {e}", parent.display())))?;
    }
    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write slips to {}", path.display()))?;

    debug!(path = %path.display(), count = records.len(), "Slips saved");
    Ok(records.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("slipgrid_test_{name}_{}.json", uuid::Uuid::new_v4()));
        p
    }

    #[test]
    fn test_load_props() {
        let path = temp_path("props");
        std::fs::write(
            &path,
            r#"[
                {"id": "P1", "player": "A", "prop_type": "points", "line": 18.5, "hit_probability": 0.58, "phase": "luteal"},
                {"id": "P2", "player": "B", "prop_type": "assists", "line": 4.5, "hit_probability": 0.61}
            ]"#,
        )
        .unwrap();

        let props = load_props(&path).unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].phase, "luteal");
        assert_eq!(props[1].phase, "unknown");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_props_rejects_bad_probability() {
        let path = temp_path("bad_props");
        std::fs::write(
            &path,
            r#"[{"id": "P1", "player": "A", "prop_type": "points", "line": 18.5, "hit_probability": 1.5}]"#,
        )
        .unwrap();
        assert!(load_props(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_props_missing_file() {
        assert!(load_props(Path::new("/tmp/slipgrid_no_props_here.json")).is_err());
    }

    #[test]
    fn test_save_slips() {
        let path = temp_path("slips");
        let mut slip = Slip::sample();
        slip.stake = Some(12.5);
        let count = save_slips([&slip], &PayoutTable::default(), &path).unwrap();
        assert_eq!(count, 1);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &written[0];
        assert_eq!(record["slip_id"], "POWER_20250701_190000_001");
        assert_eq!(record["ticket_type"], "POWER");
        assert_eq!(record["n_props"], 3);
        assert_eq!(record["stake"], 12.5);
        assert_eq!(record["phase"], "luteal");
        assert_eq!(record["props"].as_array().unwrap().len(), 3);
        assert_eq!(record["decimal_odds"], 10.0);
        let created: DateTime<Utc> = serde_json::from_value(record["created_at"].clone()).unwrap();
        assert_eq!(created, slip.created_at);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_unsized_slip_written_with_zero_stake() {
        let path = temp_path("unsized");
        let mut slip = Slip::sample();
        slip.ticket_type = TicketType::Flex;
        save_slips(std::iter::once(&slip), &PayoutTable::default(), &path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["stake"], 0.0);
        // full-hit tier of a 3-leg FLEX ticket
        assert_eq!(written[0]["decimal_odds"], 5.0);
        std::fs::remove_file(&path).unwrap();
    }
}
