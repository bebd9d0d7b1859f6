use serde::{Deserialize, Serialize};

use super::Liters;

pub type CardId = i64;

/// A fuel card: an account holding a balance in liters, optionally capped
/// by a daily consumption quota. The balance is mutated only by the refuel
/// transaction and by administrative card updates; it never goes below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub card_code: String,
    pub client_id: Option<i64>,
    pub fuel_type_id: Option<i64>,
    pub balance_liters: Liters,
    /// Maximum liters consumable per business-local calendar day.
    /// `None` or a non-positive value means unlimited.
    pub daily_limit_liters: Option<Liters>,
    pub pin_code: Option<String>,
}

impl Card {
    /// The effective daily quota, normalizing "zero or negative" to unlimited.
    pub fn daily_limit(&self) -> Option<Liters> {
        self.daily_limit_liters.filter(|limit| *limit > 0.0)
    }
}

/// The quantity actually usable right now: the raw balance capped by what
/// is left of the daily quota. Never negative.
pub fn available_balance(
    balance: Liters,
    daily_limit: Option<Liters>,
    consumed_today: Liters,
) -> Liters {
    match daily_limit {
        Some(limit) if limit > 0.0 => (limit - consumed_today).min(balance).max(0.0),
        _ => balance.max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_quota_returns_raw_balance() {
        assert_eq!(available_balance(100.0, None, 55.0), 100.0);
        assert_eq!(available_balance(100.0, Some(0.0), 55.0), 100.0);
        assert_eq!(available_balance(100.0, Some(-5.0), 55.0), 100.0);
    }

    #[test]
    fn quota_caps_available_balance() {
        // Quota 20, nothing consumed: quota wins over the raw balance
        assert_eq!(available_balance(100.0, Some(20.0), 0.0), 20.0);
        // After a 15 liter refuel only 5 remain today
        assert_eq!(available_balance(85.0, Some(20.0), 15.0), 5.0);
    }

    #[test]
    fn balance_caps_remaining_quota() {
        assert_eq!(available_balance(3.0, Some(20.0), 0.0), 3.0);
    }

    #[test]
    fn exhausted_quota_yields_zero() {
        assert_eq!(available_balance(100.0, Some(20.0), 20.0), 0.0);
        // Over-consumption (e.g. quota lowered after the fact) clamps to zero
        assert_eq!(available_balance(100.0, Some(20.0), 35.0), 0.0);
    }

    #[test]
    fn effective_daily_limit_normalizes_non_positive() {
        let mut card = Card {
            id: 1,
            card_code: "0001".into(),
            client_id: None,
            fuel_type_id: None,
            balance_liters: 50.0,
            daily_limit_liters: Some(0.0),
            pin_code: None,
        };
        assert_eq!(card.daily_limit(), None);
        card.daily_limit_liters = Some(40.0);
        assert_eq!(card.daily_limit(), Some(40.0));
    }
}
