//! Alternate-line ("goblin"/"demon") filtering.
//!
//! Boards often list several lines for the same player and stat: one
//! standard line plus easier (goblin) and harder (demon) alternates. The
//! filter groups props by `(player, prop_type)` and keeps the standard line
//! of each group so the optimizer does not stack variants of one outcome.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::types::{LineClass, Prop};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Two lines whose relative gap is at or below this percentage are both
    /// treated as standard.
    pub tolerance_pct: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { tolerance_pct: 15.0 }
    }
}

// ---------------------------------------------------------------------------
// Two-line resolution strategies
// ---------------------------------------------------------------------------

/// Policy for a two-line group whose lines are too far apart to both be
/// standard. With only two lines there is no third reference point, so
/// which one is the alternate is a business choice rather than a derivation.
pub trait LineStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pick the line to keep. `low.line <= high.line` always holds.
    fn keep<'a>(&self, low: &'a Prop, high: &'a Prop) -> &'a Prop;
}

/// Keep the lower line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeLowerStrategy;

impl LineStrategy for ConservativeLowerStrategy {
    fn name(&self) -> &'static str {
        "conservative_lower"
    }

    fn keep<'a>(&self, low: &'a Prop, _high: &'a Prop) -> &'a Prop {
        low
    }
}

/// Keep the higher line.
#[derive(Debug, Clone, Copy, Default)]
pub struct HigherLineStrategy;

impl LineStrategy for HigherLineStrategy {
    fn name(&self) -> &'static str {
        "higher"
    }

    fn keep<'a>(&self, _low: &'a Prop, high: &'a Prop) -> &'a Prop {
        high
    }
}

/// Resolve a strategy by its configured name.
pub fn strategy_from_name(name: &str) -> Option<Box<dyn LineStrategy>> {
    match name.to_lowercase().as_str() {
        "conservative_lower" | "lower" => Some(Box::new(ConservativeLowerStrategy)),
        "higher" => Some(Box::new(HigherLineStrategy)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Counts from one filtering pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub input: usize,
    pub output: usize,
    pub demons_filtered: usize,
    pub goblins_filtered: usize,
}

pub struct AnomalyFilter {
    config: FilterConfig,
    strategy: Box<dyn LineStrategy>,
}

impl AnomalyFilter {
    /// Filter using the conservative lower-line strategy.
    pub fn new(config: FilterConfig) -> Self {
        Self::with_strategy(config, Box::new(ConservativeLowerStrategy))
    }

    pub fn with_strategy(config: FilterConfig, strategy: Box<dyn LineStrategy>) -> Self {
        Self { config, strategy }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Keep the standard line of each `(player, prop_type)` group.
    pub fn filter(&self, props: &[Prop]) -> Vec<Prop> {
        self.filter_with_stats(props).0
    }

    /// Same as [`filter`](Self::filter), also returning what was dropped.
    ///
    /// Groups come out in order of first appearance; props inside a kept
    /// close pair come out sorted by line.
    pub fn filter_with_stats(&self, props: &[Prop]) -> (Vec<Prop>, FilterStats) {
        let mut stats = FilterStats {
            input: props.len(),
            ..Default::default()
        };
        let mut kept: Vec<Prop> = Vec::with_capacity(props.len());

        for group in group_props(props) {
            let sorted = sorted_by_line(&group);
            match sorted.len() {
                0 => {}
                1 => kept.push(sorted[0].clone()),
                2 => {
                    let (low, high) = (sorted[0], sorted[1]);
                    if self.within_tolerance(low.line, high.line) {
                        kept.push(low.clone());
                        kept.push(high.clone());
                    } else {
                        let keep = self.strategy.keep(low, high);
                        if std::ptr::eq(keep, low) {
                            stats.demons_filtered += 1;
                        } else {
                            stats.goblins_filtered += 1;
                        }
                        info!(
                            player = %low.player,
                            prop_type = %low.prop_type,
                            low = low.line,
                            high = high.line,
                            kept = keep.line,
                            strategy = self.strategy.name(),
                            "Filtered alternate line"
                        );
                        kept.push(keep.clone());
                    }
                }
                n => {
                    let mid = n / 2;
                    let standard = sorted[mid];
                    stats.goblins_filtered += mid;
                    stats.demons_filtered += n - mid - 1;
                    info!(
                        player = %standard.player,
                        prop_type = %standard.prop_type,
                        kept = standard.line,
                        removed = ?sorted
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != mid)
                            .map(|(_, p)| p.line)
                            .collect::<Vec<_>>(),
                        "Filtered demons/goblins"
                    );
                    kept.push(standard.clone());
                }
            }
        }

        stats.output = kept.len();
        info!(
            input = stats.input,
            output = stats.output,
            demons = stats.demons_filtered,
            goblins = stats.goblins_filtered,
            "Anomaly filter complete"
        );
        (kept, stats)
    }

    /// Label every prop of one `(player, prop_type)` group.
    pub fn classify(&self, group: &[Prop]) -> Vec<(String, LineClass)> {
        let sorted = sorted_by_line(&group.iter().collect::<Vec<_>>());
        let n = sorted.len();
        match n {
            0 => Vec::new(),
            1 => vec![(sorted[0].id.clone(), LineClass::Standard)],
            2 => {
                if self.within_tolerance(sorted[0].line, sorted[1].line) {
                    vec![
                        (sorted[0].id.clone(), LineClass::Standard),
                        (sorted[1].id.clone(), LineClass::Standard),
                    ]
                } else {
                    vec![
                        (sorted[0].id.clone(), LineClass::Goblin),
                        (sorted[1].id.clone(), LineClass::Demon),
                    ]
                }
            }
            _ => sorted
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let class = if i == 0 {
                        LineClass::Goblin
                    } else if i == n - 1 {
                        LineClass::Demon
                    } else {
                        LineClass::Standard
                    };
                    (p.id.clone(), class)
                })
                .collect(),
        }
    }

    /// Relative gap `(high - low) / low` against the tolerance.
    fn within_tolerance(&self, low: f64, high: f64) -> bool {
        if high == low {
            return true;
        }
        if low <= 0.0 {
            debug!(low, high, "Non-positive low line, treating gap as out of tolerance");
            return false;
        }
        (high - low) / low * 100.0 <= self.config.tolerance_pct
    }
}

/// Group props by `(player, prop_type)`, preserving first-seen group order.
fn group_props(props: &[Prop]) -> Vec<Vec<&Prop>> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Vec<&Prop>> = Vec::new();
    for prop in props {
        let slot = *index.entry(prop.group_key()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(prop);
    }
    groups
}

fn sorted_by_line<'a>(group: &[&'a Prop]) -> Vec<&'a Prop> {
    let mut sorted = group.to_vec();
    sorted.sort_by(|a, b| a.line.total_cmp(&b.line));
    sorted
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
