use shared::models::{IndicatorSet, SignalAction};

pub const POINTS_PER_VOTE: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub action: SignalAction,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Buy,
    Sell,
}

impl From<Vote> for SignalAction {
    fn from(vote: Vote) -> Self {
        match vote {
            Vote::Buy => SignalAction::Buy,
            Vote::Sell => SignalAction::Sell,
        }
    }
}

pub trait ScoringPolicy: Send + Sync {
    fn name(&self) -> &str;
    fn score(&self, price: f64, indicators: &IndicatorSet) -> Score;
}

/// The four indicator votes, in evaluation order: RSI, MACD, %B, price vs EMA.
/// The first three may abstain; the EMA vote never does.
pub fn votes(price: f64, indicators: &IndicatorSet) -> [Option<Vote>; 4] {
    let rsi = if indicators.rsi < 30.0 {
        Some(Vote::Buy)
    } else if indicators.rsi > 70.0 {
        Some(Vote::Sell)
    } else {
        None
    };
    let macd = if indicators.macd > 0.0 {
        Some(Vote::Buy)
    } else if indicators.macd < 0.0 {
        Some(Vote::Sell)
    } else {
        None
    };
    let percent_b = if indicators.percent_b < 20.0 {
        Some(Vote::Buy)
    } else if indicators.percent_b > 80.0 {
        Some(Vote::Sell)
    } else {
        None
    };
    let ema = if price > indicators.ema { Vote::Buy } else { Vote::Sell };
    [rsi, macd, percent_b, Some(ema)]
}

/// Reference scoring: 25 points per vote cast, capped at 100, and the action
/// of whichever vote was evaluated last. Since the EMA vote always comes last
/// and never abstains, the action always follows price vs EMA.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteScoring;

impl ScoringPolicy for VoteScoring {
    fn name(&self) -> &str {
        "votes"
    }

    fn score(&self, price: f64, indicators: &IndicatorSet) -> Score {
        let mut confidence = 0.0;
        let mut action = SignalAction::Buy;
        for vote in votes(price, indicators).into_iter().flatten() {
            confidence += POINTS_PER_VOTE;
            action = vote.into();
        }
        Score { action, confidence: f64::min(confidence, 100.0) }
    }
}

/// Majority rule: the side with more votes wins and confidence counts only
/// the agreeing votes. A tie is a hold with zero confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityVoteScoring;

impl ScoringPolicy for MajorityVoteScoring {
    fn name(&self) -> &str {
        "majority"
    }

    fn score(&self, price: f64, indicators: &IndicatorSet) -> Score {
        let cast = votes(price, indicators);
        let buys = cast.iter().filter(|v| **v == Some(Vote::Buy)).count();
        let sells = cast.iter().filter(|v| **v == Some(Vote::Sell)).count();
        match buys.cmp(&sells) {
            std::cmp::Ordering::Greater => Score { action: SignalAction::Buy, confidence: buys as f64 * POINTS_PER_VOTE },
            std::cmp::Ordering::Less => Score { action: SignalAction::Sell, confidence: sells as f64 * POINTS_PER_VOTE },
            std::cmp::Ordering::Equal => Score { action: SignalAction::Hold, confidence: 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rsi: f64, macd: f64, percent_b: f64, ema: f64) -> IndicatorSet {
        IndicatorSet { rsi, macd, percent_b, ema }
    }

    #[test]
    fn all_buy_votes_score_full_confidence() {
        let score = VoteScoring.score(110.0, &set(25.0, 1.5, 10.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Buy, confidence: 100.0 });
    }

    #[test]
    fn abstentions_reduce_confidence() {
        // Only the EMA vote is cast.
        let score = VoteScoring.score(90.0, &set(50.0, 0.0, 50.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Sell, confidence: 25.0 });
    }

    #[test]
    fn last_vote_decides_action_on_disagreement() {
        // RSI buy, MACD sell, %B abstains, price above EMA buys last.
        let score = VoteScoring.score(105.0, &set(25.0, -1.0, 50.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Buy, confidence: 75.0 });

        // Three buy votes are overridden by the EMA sell vote.
        let score = VoteScoring.score(95.0, &set(25.0, 1.0, 10.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Sell, confidence: 100.0 });
    }

    #[test]
    fn price_equal_to_ema_votes_sell() {
        let score = VoteScoring.score(100.0, &set(50.0, 0.0, 50.0, 100.0));
        assert_eq!(score.action, SignalAction::Sell);
    }

    #[test]
    fn threshold_boundaries_abstain() {
        let cast = votes(1.0, &set(30.0, 0.0, 20.0, 0.0));
        assert_eq!(cast, [None, None, None, Some(Vote::Buy)]);
        let cast = votes(1.0, &set(70.0, 0.0, 80.0, 0.0));
        assert_eq!(cast, [None, None, None, Some(Vote::Buy)]);
    }

    #[test]
    fn majority_counts_agreeing_votes() {
        let score = MajorityVoteScoring.score(95.0, &set(25.0, -1.0, 50.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Sell, confidence: 50.0 });

        let score = MajorityVoteScoring.score(95.0, &set(25.0, 1.0, 10.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Buy, confidence: 75.0 });
    }

    #[test]
    fn majority_tie_holds() {
        let score = MajorityVoteScoring.score(105.0, &set(75.0, 0.0, 50.0, 100.0));
        assert_eq!(score, Score { action: SignalAction::Hold, confidence: 0.0 });
    }
}
