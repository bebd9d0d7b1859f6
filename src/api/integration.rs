//! The 1C integration surface: balance inquiry and refuel.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::application::{CardStatus, RefuelReceipt, RefuelRequest};
use crate::domain::{Liters, Money, REFUEL};

use super::{ApiError, AppState};

/// Wire format for refuel timestamps.
const OPERATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
pub(super) struct CardStatusParams {
    card_code: Option<String>,
}

#[derive(Serialize)]
pub(super) struct CardStatusResponse {
    card_code: String,
    fuel_type: String,
    balance_liters: Liters,
    available_balance: Liters,
    daily_limit: Liters,
    client_name: String,
    client_inn: String,
}

impl From<CardStatus> for CardStatusResponse {
    fn from(status: CardStatus) -> Self {
        Self {
            card_code: status.card_code,
            fuel_type: status.fuel_type,
            balance_liters: status.balance_liters,
            available_balance: status.available_balance,
            daily_limit: status.daily_limit,
            client_name: status.client_name,
            client_inn: status.client_inn,
        }
    }
}

/// GET /card-status?card_code=...
pub(super) async fn card_status(
    State(state): State<AppState>,
    Query(params): Query<CardStatusParams>,
) -> Result<Json<CardStatusResponse>, ApiError> {
    let service = state.service()?;
    let status = service
        .card_status(params.card_code.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(status.into()))
}

#[derive(Deserialize)]
pub(super) struct RefuelBody {
    card_code: Option<String>,
    quantity: Option<Liters>,
    price: Option<Money>,
    code_1c: Option<String>,
    station_name: Option<String>,
    comment: Option<String>,
    idempotency_key: Option<String>,
}

#[derive(Serialize)]
pub(super) struct RefuelResponse {
    success: bool,
    card_code: String,
    operation_type: String,
    quantity: Liters,
    price: Money,
    amount: Money,
    previous_balance: Liters,
    new_balance: Liters,
    station_name: String,
    operation_date: String,
}

impl From<RefuelReceipt> for RefuelResponse {
    fn from(receipt: RefuelReceipt) -> Self {
        Self {
            success: true,
            card_code: receipt.card_code,
            operation_type: REFUEL.to_string(),
            quantity: receipt.quantity,
            price: receipt.price,
            amount: receipt.amount,
            previous_balance: receipt.previous_balance,
            new_balance: receipt.new_balance,
            station_name: receipt.station_name,
            operation_date: receipt
                .operation_date
                .format(OPERATION_DATE_FORMAT)
                .to_string(),
        }
    }
}

/// POST /refuel
pub(super) async fn refuel(
    State(state): State<AppState>,
    Json(body): Json<RefuelBody>,
) -> Result<Json<RefuelResponse>, ApiError> {
    let service = state.service()?;
    let receipt = service
        .refuel(RefuelRequest {
            card_code: body.card_code.unwrap_or_default(),
            quantity: body.quantity.unwrap_or_default(),
            price: body.price.unwrap_or_default(),
            code_1c: body.code_1c,
            station_name: body.station_name,
            comment: body.comment.unwrap_or_default(),
            idempotency_key: body.idempotency_key,
        })
        .await?;
    Ok(Json(receipt.into()))
}
