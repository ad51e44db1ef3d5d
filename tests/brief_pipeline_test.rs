/// Research-brief pipeline tests
///
/// Validates the hypothesis-evaluation business logic end to end on
/// synthetic data: forward-return base rates, the feasibility scoring
/// rubric, and the verdict ladder.
///
/// NOTE: These validate the scoring and aggregation rules standalone;
/// full integration against live market data requires a running server.

// ---------------------------------------------------------------------------
// Base rates
// ---------------------------------------------------------------------------

fn forward_returns(closes: &[f64], step: usize) -> Vec<f64> {
    (0..closes.len().saturating_sub(step))
        .filter(|&i| closes[i] != 0.0)
        .map(|i| (closes[i + step] - closes[i]) / closes[i] * 100.0)
        .collect()
}

fn rate_at_least(returns: &[f64], threshold: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r >= threshold).count() as f64 / returns.len() as f64 * 100.0
}

#[test]
fn test_forward_returns_window_count() {
    let closes: Vec<f64> = (0..100).map(|i| 100.0 + i as f64).collect();
    let returns = forward_returns(&closes, 30);
    assert_eq!(returns.len(), 70);
}

#[test]
fn test_base_rate_monotone_in_threshold() {
    let closes: Vec<f64> = (0..300)
        .map(|i| 100.0 + 10.0 * (i as f64 * 0.21).sin() + i as f64 * 0.02)
        .collect();
    let returns = forward_returns(&closes, 20);

    let r5 = rate_at_least(&returns, 5.0);
    let r10 = rate_at_least(&returns, 10.0);
    let r20 = rate_at_least(&returns, 20.0);

    assert!(r5 >= r10);
    assert!(r10 >= r20);
}

#[test]
fn test_base_rate_certain_move() {
    // Steady 1%-per-step climb: every 10-step window clears +5%
    let closes: Vec<f64> = (0..50).map(|i| 100.0 * 1.01f64.powi(i)).collect();
    let returns = forward_returns(&closes, 10);
    assert_eq!(rate_at_least(&returns, 5.0), 100.0);
}

// ---------------------------------------------------------------------------
// Feasibility scoring rubric (base rate 40 / technicals 30 / realism 30)
// ---------------------------------------------------------------------------

struct Technicals {
    rsi: f64,
    regime_bull: bool,
    ma_aligned: bool,
    momentum: f64,
}

fn base_rate_points(rate: Option<f64>) -> i32 {
    match rate {
        Some(r) if r >= 40.0 => 40,
        Some(r) if r >= 20.0 => 30,
        Some(r) if r >= 10.0 => 20,
        Some(r) if r >= 5.0 => 10,
        Some(_) => 2,
        None => 0,
    }
}

fn technical_points(implied_return_pct: f64, t: &Technicals) -> i32 {
    let mut points = 0;
    if implied_return_pct > 0.0 {
        if t.regime_bull {
            points += 10;
        }
        if t.ma_aligned {
            points += 10;
        }
        if t.momentum > 0.0 {
            points += 5;
        }
        if t.rsi > 40.0 && t.rsi < 70.0 {
            points += 5;
        }
    } else {
        if !t.regime_bull {
            points += 10;
        }
        if !t.ma_aligned {
            points += 10;
        }
        if t.momentum < 0.0 {
            points += 5;
        }
        if t.rsi > 70.0 || t.rsi < 30.0 {
            points += 5;
        }
    }
    points
}

fn realism_points(unrealistic: bool, z_score: Option<f64>) -> i32 {
    if !unrealistic {
        30
    } else {
        match z_score {
            Some(z) if z < 5.0 => 15,
            Some(z) if z < 10.0 => 5,
            _ => 0,
        }
    }
}

#[test]
fn test_component_caps() {
    assert_eq!(base_rate_points(Some(55.0)), 40);
    let aligned = Technicals {
        rsi: 55.0,
        regime_bull: true,
        ma_aligned: true,
        momentum: 1.0,
    };
    assert_eq!(technical_points(12.0, &aligned), 30);
    assert_eq!(realism_points(false, None), 30);
}

#[test]
fn test_total_score_bounded() {
    let aligned = Technicals {
        rsi: 55.0,
        regime_bull: true,
        ma_aligned: true,
        momentum: 1.0,
    };
    let total = base_rate_points(Some(90.0)) + technical_points(10.0, &aligned)
        + realism_points(false, None);
    assert_eq!(total, 100);
}

#[test]
fn test_bearish_hypothesis_rewards_bearish_tape() {
    let bear_tape = Technicals {
        rsi: 25.0,
        regime_bull: false,
        ma_aligned: false,
        momentum: -1.5,
    };
    assert_eq!(technical_points(-8.0, &bear_tape), 30);
    // The same tape contributes nothing to a bullish hypothesis
    assert_eq!(technical_points(8.0, &bear_tape), 0);
}

#[test]
fn test_unrealistic_moves_lose_realism_points() {
    assert_eq!(realism_points(true, Some(3.5)), 15);
    assert_eq!(realism_points(true, Some(7.0)), 5);
    assert_eq!(realism_points(true, Some(15.0)), 0);
}

// ---------------------------------------------------------------------------
// Verdict ladder
// ---------------------------------------------------------------------------

fn verdict(rate: f64, implied: f64, max_gain: f64) -> &'static str {
    if implied > max_gain {
        "never happened"
    } else if rate < 5.0 {
        "rare"
    } else if rate < 20.0 {
        "unlikely"
    } else {
        "normal"
    }
}

#[test]
fn test_verdict_ladder_edges() {
    assert_eq!(verdict(0.0, 300.0, 45.0), "never happened");
    assert_eq!(verdict(3.0, 30.0, 45.0), "rare");
    assert_eq!(verdict(12.0, 20.0, 45.0), "unlikely");
    assert_eq!(verdict(35.0, 5.0, 45.0), "normal");
}

#[test]
fn test_pipeline_on_synthetic_rally() {
    // A steady riser: +10% over 20 steps should be "normal" and score high
    let closes: Vec<f64> = (0..300).map(|i| 100.0 * 1.005f64.powi(i)).collect();
    let returns = forward_returns(&closes, 20);
    let implied = 8.0;
    let rate = rate_at_least(&returns, implied);
    let max_gain = returns.iter().cloned().fold(f64::MIN, f64::max);

    assert_eq!(verdict(rate, implied, max_gain), "normal");

    let tape = Technicals {
        rsi: 60.0,
        regime_bull: true,
        ma_aligned: true,
        momentum: 2.0,
    };
    let score = base_rate_points(Some(rate)) + technical_points(implied, &tape)
        + realism_points(false, None);
    assert_eq!(score, 100);
}
