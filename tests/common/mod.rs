// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use fuelcard::application::{AppService, RefuelRequest};
use fuelcard::config::BusinessTime;
use fuelcard::domain::Liters;
use fuelcard::storage::NewCard;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AppService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let url = format!("sqlite:{}", db_path.display());
    let service = AppService::init(&url, BusinessTime::from_offset_hours(3)).await?;
    Ok((service, temp_dir))
}

/// Standard fixture: one station (code "ST-01") and one card
pub struct Seed;

impl Seed {
    pub async fn station(service: &AppService, name: &str, code_1c: &str) -> Result<i64> {
        let station = service.create_station(name, Some(code_1c), None).await?;
        Ok(station.id)
    }

    pub async fn card(
        service: &AppService,
        card_code: &str,
        balance: Liters,
        daily_limit: Option<Liters>,
    ) -> Result<i64> {
        let card = service
            .create_card(NewCard {
                card_code: card_code.to_string(),
                client_id: None,
                fuel_type_id: None,
                balance_liters: balance,
                daily_limit_liters: daily_limit,
                pin_code: None,
            })
            .await?;
        Ok(card.card.id)
    }

    /// Station "Central" with code "ST-01" plus a card with the given balance
    pub async fn station_and_card(
        service: &AppService,
        card_code: &str,
        balance: Liters,
    ) -> Result<()> {
        Self::station(service, "Central", "ST-01").await?;
        Self::card(service, card_code, balance, None).await?;
        Ok(())
    }
}

/// A refuel request against station code "ST-01" with price 50
pub fn refuel_request(card_code: &str, quantity: Liters) -> RefuelRequest {
    RefuelRequest {
        card_code: card_code.to_string(),
        quantity,
        price: 50.0,
        code_1c: Some("ST-01".to_string()),
        station_name: None,
        comment: String::new(),
        idempotency_key: None,
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
