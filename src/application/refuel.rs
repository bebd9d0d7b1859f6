//! The refuel transaction and the balance inquiry.
//!
//! Both run against a single database transaction. The refuel debit is a
//! conditional UPDATE executed before any dependent read, so the balance
//! check and the decrement are one atomic statement per card: two racing
//! refuels serialize on the row and the loser re-checks the committed
//! balance. The ledger append commits or rolls back together with the
//! debit.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::domain::{Liters, Money, StationRef, available_balance};
use crate::storage::{RecordedRefuel, RefuelInsert, RefuelRecord};

use super::{AppError, AppService};

/// A refuel request as it arrives from the integration endpoint, before
/// validation.
#[derive(Debug, Clone)]
pub struct RefuelRequest {
    pub card_code: String,
    pub quantity: Liters,
    pub price: Money,
    pub code_1c: Option<String>,
    pub station_name: Option<String>,
    pub comment: String,
    pub idempotency_key: Option<String>,
}

/// Outcome of a committed (or replayed) refuel.
#[derive(Debug, Clone)]
pub struct RefuelReceipt {
    pub card_code: String,
    pub quantity: Liters,
    pub price: Money,
    pub amount: Money,
    pub previous_balance: Liters,
    pub new_balance: Liters,
    pub station_name: String,
    pub operation_date: NaiveDateTime,
}

/// Balance inquiry result for one card.
#[derive(Debug, Clone)]
pub struct CardStatus {
    pub card_code: String,
    pub fuel_type: String,
    pub balance_liters: Liters,
    pub available_balance: Liters,
    pub daily_limit: Liters,
    pub client_name: String,
    pub client_inn: String,
}

impl AppService {
    /// Atomically apply a refuel: validate, debit the card balance and
    /// append the ledger entry. Any failure rolls the whole thing back.
    pub async fn refuel(&self, request: RefuelRequest) -> Result<RefuelReceipt, AppError> {
        // Fail-fast validation, before any store interaction
        let card_code = request.card_code.trim().to_string();
        if card_code.is_empty() {
            return Err(AppError::InvalidRequest("card_code is required".into()));
        }
        if !(request.quantity > 0.0) {
            return Err(AppError::InvalidRequest(
                "quantity must be greater than 0".into(),
            ));
        }
        let station_ref = StationRef::from_parts(
            request.code_1c.as_deref(),
            request.station_name.as_deref(),
        )
        .ok_or_else(|| {
            AppError::InvalidRequest("station reference (code_1c or station_name) is required".into())
        })?;

        let idempotency_key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(String::from);

        // A repeated key replays the recorded outcome without debiting again
        if let Some(key) = idempotency_key.as_deref() {
            if let Some(recorded) = self.repo.find_refuel_by_key(key).await? {
                info!(card_code = %card_code, key = %key, "refuel replayed from ledger");
                return Ok(receipt_from_recorded(recorded));
            }
        }

        let mut tx = self.repo.begin().await?;

        // Debit first: the conditional UPDATE takes the write lock and
        // re-checks the balance atomically. Dropping the transaction on any
        // early return below rolls the debit back.
        let debited = self
            .repo
            .tx_debit_card(&mut tx, &card_code, request.quantity)
            .await?;
        let (card_id, new_balance) = match debited {
            Some(applied) => applied,
            None => {
                let card = self.repo.tx_get_card_by_code(&mut tx, &card_code).await?;
                return Err(match card {
                    None => AppError::CardNotFound(card_code),
                    Some(card) => {
                        warn!(
                            card_code = %card_code,
                            balance = card.balance_liters,
                            requested = request.quantity,
                            "refuel rejected: insufficient balance"
                        );
                        AppError::InsufficientBalance {
                            current_balance: card.balance_liters,
                            requested_quantity: request.quantity,
                        }
                    }
                });
            }
        };

        // Both lookup variants fail hard on a miss; the debit rolls back
        let station = match &station_ref {
            StationRef::Code(code) => self.repo.tx_get_station_by_code(&mut tx, code).await?,
            StationRef::Name(name) => self.repo.tx_get_station_by_name(&mut tx, name).await?,
        };
        let Some(station) = station else {
            return Err(AppError::StationNotFound(station_ref.reference().to_string()));
        };

        let amount = request.quantity * request.price;
        let previous_balance = new_balance + request.quantity;
        let operation_date = self.clock.now();

        let record = RefuelRecord {
            fuel_card_id: card_id,
            station_id: station.id,
            operation_date,
            quantity: request.quantity,
            price: request.price,
            amount,
            comment: request.comment.trim().to_string(),
            idempotency_key: idempotency_key.clone(),
            balance_after: new_balance,
        };

        match self.repo.tx_insert_refuel(&mut tx, &record).await? {
            RefuelInsert::Inserted(_) => {
                tx.commit()
                    .await
                    .map_err(|e| AppError::Database(e.into()))?;
            }
            RefuelInsert::DuplicateKey => {
                // A concurrent request with the same key committed first:
                // drop our transaction (restoring the balance) and echo the
                // winner's recorded outcome.
                drop(tx);
                let key = idempotency_key.as_deref().unwrap_or_default();
                let recorded = self.repo.find_refuel_by_key(key).await?.ok_or_else(|| {
                    AppError::Database(anyhow::anyhow!(
                        "duplicate idempotency key without a recorded refuel"
                    ))
                })?;
                info!(card_code = %card_code, key = %key, "refuel replayed after losing a duplicate race");
                return Ok(receipt_from_recorded(recorded));
            }
        }

        info!(
            card_code = %card_code,
            quantity = request.quantity,
            amount,
            new_balance,
            station = %station.name,
            "refuel applied"
        );

        Ok(RefuelReceipt {
            card_code,
            quantity: request.quantity,
            price: request.price,
            amount,
            previous_balance,
            new_balance,
            station_name: station.name,
            operation_date,
        })
    }

    /// Read-only balance inquiry: raw balance, daily quota and the
    /// available balance derived from today's consumption. The card row
    /// and the ledger sum are read from one transaction so the two can
    /// never disagree about a refuel landing in between.
    pub async fn card_status(&self, card_code: &str) -> Result<CardStatus, AppError> {
        let card_code = card_code.trim();
        if card_code.is_empty() {
            return Err(AppError::InvalidRequest("card_code is required".into()));
        }

        let mut tx = self.repo.begin().await?;

        let overview = self
            .repo
            .tx_card_overview(&mut tx, card_code)
            .await?
            .ok_or_else(|| AppError::CardNotFound(card_code.to_string()))?;

        let consumed_today = match overview.card.daily_limit() {
            Some(_) => {
                let (from, to) = self.clock.today_window();
                self.repo
                    .tx_sum_refuels(&mut tx, overview.card.id, from, to)
                    .await?
            }
            None => 0.0,
        };

        // Read-only: dropping the transaction releases the snapshot
        drop(tx);

        let available = available_balance(
            overview.card.balance_liters,
            overview.card.daily_limit(),
            consumed_today,
        );

        Ok(CardStatus {
            card_code: overview.card.card_code.clone(),
            fuel_type: overview.fuel_type.unwrap_or_default(),
            balance_liters: overview.card.balance_liters,
            available_balance: available,
            daily_limit: overview.card.daily_limit_liters.unwrap_or(0.0),
            client_name: overview.client_name.unwrap_or_default(),
            client_inn: overview.client_inn.unwrap_or_default(),
        })
    }
}

fn receipt_from_recorded(recorded: RecordedRefuel) -> RefuelReceipt {
    let new_balance = recorded.balance_after.unwrap_or_default();
    RefuelReceipt {
        card_code: recorded.card_code,
        quantity: recorded.quantity,
        price: recorded.price,
        amount: recorded.amount,
        previous_balance: new_balance + recorded.quantity,
        new_balance,
        station_name: recorded.station_name.unwrap_or_default(),
        operation_date: recorded.operation_date,
    }
}
