//! Deterministic prop boards for integration testing.
//!
//! Builds boards in memory with known probabilities, optional alternate
//! lines and mixed phases, so pipeline assertions can be exact.

use slipgrid::types::Prop;

const PHASES: [&str; 5] = ["follicular", "ovulatory", "luteal", "menstrual", "unknown"];

/// Builder for a board of standard props plus optional alternates.
pub struct MockBoard {
    props: Vec<Prop>,
}

impl MockBoard {
    /// `count` standard props, one per player, with probabilities spread
    /// over [0.52, 0.66] and phases cycling through every named phase.
    pub fn new(count: usize) -> Self {
        let props = (0..count)
            .map(|i| Prop {
                id: format!("P{i:03}"),
                player: format!("Player {i}"),
                prop_type: "points".to_string(),
                line: 20.0,
                hit_probability: 0.52 + ((i * 7) % 8) as f64 * 0.02,
                phase: PHASES[i % PHASES.len()].to_string(),
            })
            .collect();
        Self { props }
    }

    /// Add a goblin and a demon around player `index`'s standard line.
    pub fn with_alternates(mut self, index: usize) -> Self {
        let base = self.props[index].clone();
        for (suffix, line, p) in [("gob", base.line * 0.6, 0.9), ("dem", base.line * 1.5, 0.95)] {
            self.props.push(Prop {
                id: format!("{}-{suffix}", base.id),
                line,
                hit_probability: p,
                ..base.clone()
            });
        }
        self
    }

    /// Add a single second line for player `index`, `gap_pct` above the
    /// standard one.
    pub fn with_second_line(mut self, index: usize, gap_pct: f64) -> Self {
        let base = self.props[index].clone();
        self.props.push(Prop {
            id: format!("{}-alt", base.id),
            line: base.line * (1.0 + gap_pct / 100.0),
            ..base
        });
        self
    }

    pub fn build(self) -> Vec<Prop> {
        self.props
    }
}

/// A single prop with explicit fields.
pub fn prop(id: &str, player: &str, line: f64, p: f64) -> Prop {
    Prop {
        id: id.to_string(),
        player: player.to_string(),
        prop_type: "points".to_string(),
        line,
        hit_probability: p,
        phase: "unknown".to_string(),
    }
}
