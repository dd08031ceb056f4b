use shared::models::TradeConfig;

/// Placeholder quantity used when no balance is known.
pub const PLACEHOLDER_QUANTITY: f64 = 0.01;

pub trait SizingPolicy: Send + Sync {
    fn name(&self) -> &str;
    fn quantity(&self, price: f64, config: &TradeConfig, balance: Option<f64>) -> f64;
}

/// Always the same quantity. This is a stand-in, not a sizing algorithm.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuantity(pub f64);

impl Default for FixedQuantity {
    fn default() -> Self {
        FixedQuantity(PLACEHOLDER_QUANTITY)
    }
}

impl SizingPolicy for FixedQuantity {
    fn name(&self) -> &str {
        "fixed"
    }

    fn quantity(&self, _price: f64, _config: &TradeConfig, _balance: Option<f64>) -> f64 {
        self.0
    }
}

/// `balance * balance_per_trade_pct / 100 / price`, falling back to a fixed
/// quantity when the balance is unknown or the result is unusable.
#[derive(Debug, Clone, Copy)]
pub struct BalancePercent {
    pub fallback: f64,
}

impl Default for BalancePercent {
    fn default() -> Self {
        BalancePercent { fallback: PLACEHOLDER_QUANTITY }
    }
}

impl SizingPolicy for BalancePercent {
    fn name(&self) -> &str {
        "balance_percent"
    }

    fn quantity(&self, price: f64, config: &TradeConfig, balance: Option<f64>) -> f64 {
        let Some(balance) = balance.filter(|b| *b > 0.0) else {
            return self.fallback;
        };
        let quantity = balance * config.balance_per_trade_pct / 100.0 / price;
        if quantity.is_finite() && quantity > 0.0 {
            quantity
        } else {
            self.fallback
        }
    }
}
