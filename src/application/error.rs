use thiserror::Error;

use crate::domain::Liters;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Card {0} not found")]
    CardNotFound(String),

    #[error("Station {0} not found")]
    StationNotFound(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Insufficient balance on card: {current_balance} available, {requested_quantity} requested")]
    InsufficientBalance {
        current_balance: Liters,
        requested_quantity: Liters,
    },

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("DATABASE_URL is not configured")]
    Configuration,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
