// Performance metrics over the closed trades of a replay. Pure functions:
// trade results in, scalar out.
use shared::models::{SimulatedTrade, TradeStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct TradeMetrics {
    pub total_trades: usize,
    pub win_trades: usize,
    pub loss_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub total_profit_percent: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub final_balance: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl TradeMetrics {
    /// Closed trades only, in the order they were closed.
    pub fn compute(trades: &[SimulatedTrade], initial_balance: f64) -> Self {
        let closed: Vec<&SimulatedTrade> = trades.iter().filter(|t| t.status == TradeStatus::Closed).collect();
        let profits: Vec<f64> = closed.iter().map(|t| t.profit.unwrap_or(0.0)).collect();
        let returns: Vec<f64> = closed.iter().map(|t| t.profit_percent.unwrap_or(0.0)).collect();

        let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = profits.iter().copied().filter(|p| *p < 0.0).collect();
        let total_profit: f64 = profits.iter().sum();
        let final_balance = initial_balance + total_profit;

        TradeMetrics {
            total_trades: closed.len(),
            win_trades: wins.len(),
            loss_trades: losses.len(),
            win_rate: win_rate(wins.len(), closed.len()),
            total_profit,
            total_profit_percent: if initial_balance > 0.0 { total_profit * 100.0 / initial_balance } else { 0.0 },
            max_drawdown: max_drawdown(&equity_curve(initial_balance, &profits)),
            sharpe_ratio: sharpe_ratio(&returns),
            profit_factor: profit_factor(&profits),
            final_balance,
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
        }
    }
}

pub fn win_rate(wins: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    wins as f64 * 100.0 / total as f64
}

/// Initial balance followed by the running balance after each trade.
pub fn equity_curve(initial_balance: f64, profits: &[f64]) -> Vec<f64> {
    let mut curve = Vec::with_capacity(profits.len() + 1);
    curve.push(initial_balance);
    let mut equity = initial_balance;
    for profit in profits {
        equity += profit;
        curve.push(equity);
    }
    curve
}

/// Largest peak-to-trough decline, in percent of the peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0;
    for &equity in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = f64::max(worst, (peak - equity) * 100.0 / peak);
        }
    }
    worst
}

/// mean / population std of per-trade returns. 0 with fewer than two returns
/// or no dispersion.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let avg = mean(returns);
    let variance = returns.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / returns.len() as f64;
    let std = variance.sqrt();
    if std < 1e-12 {
        return 0.0;
    }
    avg / std
}

/// Gross profit over gross loss. Infinite with wins and no losses, 0 without wins.
pub fn profit_factor(profits: &[f64]) -> f64 {
    let gross_profit: f64 = profits.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = profits.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();
    if gross_profit == 0.0 {
        0.0
    } else if gross_loss == 0.0 {
        f64::INFINITY
    } else {
        gross_profit / gross_loss
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
