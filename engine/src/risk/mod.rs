// Eligibility checks between a signal and a new position.
pub mod gate;
pub mod sizing;

pub use gate::{AccountState, GateOutcome, RejectReason, RiskGate};
pub use sizing::{BalancePercent, FixedQuantity, SizingPolicy};
