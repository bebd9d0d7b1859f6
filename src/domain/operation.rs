use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{CardId, Liters, Money, StationId};

pub type OperationId = i64;

/// The only operation kind the refuel transaction produces. Administrative
/// entries may carry arbitrary kinds; those are free-form historical records.
pub const REFUEL: &str = "refuel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Refuel,
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Refuel => REFUEL,
            OperationKind::Other(kind) => kind,
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s == REFUEL {
            OperationKind::Refuel
        } else {
            OperationKind::Other(s.to_string())
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger entry tied to a card and (usually) a station. Created once,
/// never mutated by the refuel core; `amount` is recorded at creation time,
/// not recomputed later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub fuel_card_id: CardId,
    pub station_id: Option<StationId>,
    /// Business-local wall-clock time of the operation.
    pub operation_date: NaiveDateTime,
    pub kind: OperationKind,
    pub quantity: Liters,
    pub price: Money,
    pub amount: Money,
    pub comment: String,
    /// Caller-supplied deduplication token for refuels; unique when present.
    pub idempotency_key: Option<String>,
    /// Card balance right after a refuel debit; `None` for admin entries.
    pub balance_after: Option<Liters>,
}

impl Operation {
    pub fn is_refuel(&self) -> bool {
        self.kind == OperationKind::Refuel
    }
}
