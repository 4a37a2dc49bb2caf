//! Full pipeline: raw board → filter → slip search → sizing → report.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use slipgrid::config::AppConfig;
use slipgrid::engine::report::BatchReport;
use slipgrid::engine::runner::{run_parallel, BatchJob};
use slipgrid::storage;
use slipgrid::strategy::anomaly::{AnomalyFilter, FilterConfig, HigherLineStrategy};
use slipgrid::strategy::ev::{hit_distribution, EvCalculator, PayoutTable};
use slipgrid::strategy::kelly::{BankrollOptimizer, BetConstraints, PhaseDivisorTable};
use slipgrid::strategy::portfolio::{OptimizerConfig, PortfolioOptimizer};
use slipgrid::strategy::{BatchOutcome, BatchTargets, SlipStrategy};
use slipgrid::types::{Prop, TicketType};

use crate::mock_board::{prop, MockBoard};

fn default_strategy() -> SlipStrategy {
    SlipStrategy::new(
        AnomalyFilter::new(FilterConfig::default()),
        PortfolioOptimizer::new(OptimizerConfig::default(), EvCalculator::new(PayoutTable::default())),
        BankrollOptimizer::new(PhaseDivisorTable::default(), BetConstraints::default()),
    )
}

fn ids(props: &[Prop]) -> Vec<&str> {
    props.iter().map(|p| p.id.as_str()).collect()
}

fn assert_batch_invariants(outcome: &BatchOutcome, target: usize, max_per_prop: usize, bankroll: f64) {
    let slips: Vec<_> = outcome.all_slips().collect();
    assert!(slips.len() <= target);

    let mut usage: HashMap<&str, usize> = HashMap::new();
    for slip in &slips {
        assert_eq!(slip.ticket_type, outcome.ticket_type);
        assert!((3..=6).contains(&slip.n_props()), "{slip}");
        assert!(slip.ev > 0.0, "{slip}");

        let distinct: HashSet<&str> = slip.prop_ids().into_iter().collect();
        assert_eq!(distinct.len(), slip.n_props(), "repeated leg in {slip}");
        for id in distinct {
            *usage.entry(id).or_default() += 1;
        }
    }
    assert!(usage.values().all(|&n| n <= max_per_prop), "{usage:?}");

    for slip in &outcome.staked {
        let stake = slip.stake.unwrap();
        assert!(stake >= 5.0 && stake <= bankroll * 0.10 + 1e-9, "{slip}");
    }
    for slip in &outcome.suppressed {
        assert_eq!(slip.stake, Some(0.0));
    }
}

// ---------------------------------------------------------------------------
// Component scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_power_ev_three_legs() {
    let calc = EvCalculator::new(PayoutTable::new([(3, 6.0)], []));
    let props: Vec<Prop> = (0..3).map(|i| prop(&format!("P{i}"), &format!("A{i}"), 10.5, 0.6)).collect();
    let ev = calc.ev(TicketType::Power, &props);
    assert!((ev.value() - 0.296).abs() < 1e-9);
    assert!(ev.selectable().is_some());
}

#[test]
fn test_flex_ev_three_legs() {
    let calc = EvCalculator::new(PayoutTable::new([], [((3, 3), 5.0), ((2, 3), 1.0)]));
    let ev = calc.flex_ev_from_probs(&[0.6, 0.6, 0.6]);
    assert!((ev.value() - 0.512).abs() < 1e-9);
}

#[test]
fn test_out_of_range_ticket_is_invalid() {
    let calc = EvCalculator::default();
    let ev = calc.power_ev_from_probs(&[0.9, 0.9]);
    assert!(!ev.is_valid());
    assert_eq!(ev.value(), -1.0);
    assert!(ev.selectable().is_none());
}

#[test]
fn test_hit_distribution_sums_to_one() {
    for probs in [[0.1, 0.5, 0.9], [0.33, 0.66, 0.99], [0.0, 1.0, 0.5]] {
        let total: f64 = hit_distribution(&probs).iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_kelly_stake_example() {
    let optimizer = BankrollOptimizer::default();
    assert_eq!(optimizer.size_bet(1000.0, 0.05, "follicular"), 12.5);
}

#[test]
fn test_kelly_more_aggressive_phase_stakes_more() {
    let optimizer = BankrollOptimizer::default();
    let ovulatory = optimizer.size_bet(1000.0, 0.2, "ovulatory");
    let menstrual = optimizer.size_bet(1000.0, 0.2, "menstrual");
    let unnamed = optimizer.size_bet(1000.0, 0.2, "not-a-phase");
    assert!(ovulatory >= menstrual);
    assert_eq!(unnamed, optimizer.size_bet(1000.0, 0.2, "unknown"));
}

#[test]
fn test_filter_tolerance_pairs() {
    let filter = AnomalyFilter::new(FilterConfig::default());

    let close = filter.filter(&[prop("a", "X", 20.0, 0.5), prop("b", "X", 22.0, 0.5)]);
    assert_eq!(ids(&close), vec!["a", "b"]);

    let wide = filter.filter(&[prop("a", "X", 20.0, 0.5), prop("b", "X", 26.0, 0.5)]);
    assert_eq!(ids(&wide), vec!["a"]);

    let higher = AnomalyFilter::with_strategy(FilterConfig::default(), Box::new(HigherLineStrategy));
    let wide = higher.filter(&[prop("a", "X", 20.0, 0.5), prop("b", "X", 26.0, 0.5)]);
    assert_eq!(ids(&wide), vec!["b"]);
}

#[test]
fn test_filter_keeps_floor_median() {
    let filter = AnomalyFilter::new(FilterConfig::default());
    let group: Vec<Prop> = [18.0, 10.0, 14.0, 16.0, 12.0]
        .iter()
        .enumerate()
        .map(|(i, &line)| prop(&format!("L{i}"), "X", line, 0.5))
        .collect();
    let kept = filter.filter(&group);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].line, 14.0);
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_alternates_never_reach_slips() {
    let board = MockBoard::new(15).with_alternates(0).with_alternates(4).build();
    let strategy = default_strategy();

    let (filtered, stats) = strategy.prepare_board(&board);
    assert_eq!(stats.input, 19);
    assert_eq!(stats.output, 15);
    assert_eq!(stats.demons_filtered, 2);
    assert_eq!(stats.goblins_filtered, 2);
    assert!(filtered.iter().all(|p| !p.id.contains('-')));

    let outcomes = strategy.run(&board, BatchTargets::default(), 1000.0);
    for outcome in &outcomes {
        assert!(outcome.all_slips().all(|s| s.props.iter().all(|p| !p.id.contains('-'))));
    }
}

#[test]
fn test_pipeline_invariants() {
    let board = MockBoard::new(18).with_second_line(2, 10.0).with_second_line(5, 30.0).build();
    let strategy = default_strategy();
    let targets = BatchTargets { power: 6, flex: 6 };

    let outcomes = strategy.run(&board, targets, 1000.0);
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_batch_invariants(outcome, targets.for_ticket(outcome.ticket_type), 3, 1000.0);
    }
    assert!(!outcomes[0].staked.is_empty());

    let slip_ids: HashSet<&str> = outcomes
        .iter()
        .flat_map(|o| o.all_slips())
        .map(|s| s.slip_id.as_str())
        .collect();
    assert_eq!(slip_ids.len(), outcomes.iter().map(|o| o.all_slips().count()).sum::<usize>());

    for slip in outcomes.iter().flat_map(|o| o.all_slips()) {
        let parts: Vec<&str> = slip.slip_id.split('_').collect();
        assert_eq!(parts.len(), 4, "{}", slip.slip_id);
        assert_eq!(parts[0], slip.ticket_type.to_string());
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 3);
    }
}

#[test]
fn test_tight_cap_from_config() {
    let cfg = AppConfig::from_toml_str(
        r#"
        [optimizer]
        power_target = 10
        flex_target = 10
        beam_width = 20
        max_per_prop = 1
        "#,
    )
    .unwrap();
    let strategy = SlipStrategy::new(
        cfg.anomaly_filter(),
        PortfolioOptimizer::new(cfg.optimizer_config(), EvCalculator::default()),
        BankrollOptimizer::new(PhaseDivisorTable::default(), cfg.bet_constraints()),
    );

    let outcomes = strategy.run(&MockBoard::new(12).build(), cfg.targets(), cfg.bankroll.bankroll);
    for outcome in &outcomes {
        assert_batch_invariants(outcome, 10, 1, cfg.bankroll.bankroll);
        // 12 props used at most once each, at least 3 legs per slip
        assert!(outcome.all_slips().count() <= 4);
    }
}

#[test]
fn test_no_positive_ev_board() {
    let board: Vec<Prop> = (0..10).map(|i| prop(&format!("P{i}"), &format!("A{i}"), 9.5, 0.15)).collect();
    let outcomes = default_strategy().run(&board, BatchTargets::default(), 1000.0);
    assert!(outcomes.iter().all(|o| o.all_slips().count() == 0));
}

#[test]
fn test_board_too_small() {
    let board = MockBoard::new(2).build();
    let outcomes = default_strategy().run(&board, BatchTargets::default(), 1000.0);
    assert!(outcomes.iter().all(|o| o.all_slips().count() == 0));
}

#[tokio::test]
async fn test_parallel_run_report_and_output() {
    let strategy = Arc::new(default_strategy());
    let raw = MockBoard::new(16).with_alternates(1).build();
    let (board, stats) = strategy.prepare_board(&raw);

    let jobs = BatchJob::for_targets(BatchTargets { power: 4, flex: 4 }, 1000.0);
    let outcomes = run_parallel(Arc::clone(&strategy), Arc::new(board), jobs).await.unwrap();
    assert_eq!(outcomes[0].ticket_type, TicketType::Power);
    assert_eq!(outcomes[1].ticket_type, TicketType::Flex);

    let report = BatchReport::build(&stats, &outcomes, 1000.0);
    assert_eq!(report.props_in, 18);
    assert_eq!(report.props_after_filter, 16);
    for (summary, outcome) in report.tickets.iter().zip(&outcomes) {
        assert_eq!(summary.staked, outcome.staked.len());
        assert_eq!(summary.suppressed, outcome.suppressed.len());
    }
    assert!(report.total_stake() > Decimal::ZERO);
    assert!(report.exposure() <= Decimal::ONE);

    let path = std::env::temp_dir().join(format!("slipgrid_it_{}.json", uuid::Uuid::new_v4()));
    let staked = outcomes.iter().flat_map(|o| o.staked.iter());
    let written = storage::save_slips(staked, &PayoutTable::default(), &path).unwrap();
    assert_eq!(written, outcomes.iter().map(|o| o.staked.len()).sum::<usize>());

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), written);
    for record in json.as_array().unwrap() {
        assert!(record["decimal_odds"].as_f64().unwrap() > 0.0);
        assert!(record["created_at"].is_string());
    }
    std::fs::remove_file(&path).unwrap();
}
