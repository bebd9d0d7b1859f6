mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{Seed, approx_eq, refuel_request, test_service};
use fuelcard::application::{AppError, RefuelRequest};
use fuelcard::domain::OperationKind;

#[tokio::test]
async fn refuel_debits_balance_and_appends_ledger_entry() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let receipt = service.refuel(refuel_request("CARD-1", 30.0)).await?;

    assert_eq!(receipt.card_code, "CARD-1");
    assert!(approx_eq(receipt.previous_balance, 100.0));
    assert!(approx_eq(receipt.new_balance, 70.0));
    assert!(approx_eq(receipt.amount, 1500.0));
    assert_eq!(receipt.station_name, "Central");

    // The ledger entry matches the receipt
    let operations = service.list_operations().await?;
    assert_eq!(operations.len(), 1);
    let entry = &operations[0];
    assert_eq!(entry.operation.kind, OperationKind::Refuel);
    assert!(approx_eq(entry.operation.quantity, 30.0));
    assert!(approx_eq(entry.operation.amount, 1500.0));
    assert_eq!(entry.operation.operation_date, receipt.operation_date);
    assert_eq!(entry.card_code.as_deref(), Some("CARD-1"));
    assert_eq!(entry.station_name.as_deref(), Some("Central"));

    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 70.0));
    Ok(())
}

#[tokio::test]
async fn repeated_refuels_until_the_balance_runs_out() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let first = service.refuel(refuel_request("CARD-1", 30.0)).await?;
    assert!(approx_eq(first.new_balance, 70.0));

    let second = service.refuel(refuel_request("CARD-1", 30.0)).await?;
    assert!(approx_eq(second.new_balance, 40.0));

    let err = service
        .refuel(refuel_request("CARD-1", 1000.0))
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientBalance {
            current_balance,
            requested_quantity,
        } => {
            assert!(approx_eq(current_balance, 40.0));
            assert!(approx_eq(requested_quantity, 1000.0));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    // The failed refuel left no trace
    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 40.0));
    assert_eq!(service.list_operations().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_card_is_rejected_without_touching_the_store() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station(&service, "Central", "ST-01").await?;

    let err = service
        .refuel(refuel_request("NO-SUCH-CARD", 10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CardNotFound(_)));
    assert!(service.list_operations().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn validation_rejects_bad_input_before_the_store() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let mut request = refuel_request("", 10.0);
    let err = service.refuel(request).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    request = refuel_request("CARD-1", 0.0);
    let err = service.refuel(request).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    request = refuel_request("CARD-1", -5.0);
    let err = service.refuel(request).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    request = refuel_request("CARD-1", 10.0);
    request.code_1c = None;
    let err = service.refuel(request).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    // Nothing was debited or recorded
    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 100.0));
    assert!(service.list_operations().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn unresolved_station_rolls_the_debit_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let mut request = refuel_request("CARD-1", 10.0);
    request.code_1c = Some("NO-SUCH-CODE".into());
    let err = service.refuel(request).await.unwrap_err();
    assert!(matches!(err, AppError::StationNotFound(_)));

    // Name-based resolution fails hard too
    let mut request = refuel_request("CARD-1", 10.0);
    request.code_1c = None;
    request.station_name = Some("No Such Station".into());
    let err = service.refuel(request).await.unwrap_err();
    assert!(matches!(err, AppError::StationNotFound(_)));

    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 100.0));
    assert!(service.list_operations().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn station_resolution_by_name_works() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let mut request = refuel_request("CARD-1", 10.0);
    request.code_1c = None;
    request.station_name = Some("Central".into());
    let receipt = service.refuel(request).await?;
    assert_eq!(receipt.station_name, "Central");
    assert!(approx_eq(receipt.new_balance, 90.0));
    Ok(())
}

#[tokio::test]
async fn idempotency_key_replays_instead_of_double_debiting() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let mut request = refuel_request("CARD-1", 30.0);
    request.idempotency_key = Some("1c-batch-42".into());

    let first = service.refuel(request.clone()).await?;
    assert!(approx_eq(first.new_balance, 70.0));

    // A blind retry gets the recorded outcome back, not a second debit
    let replay = service.refuel(request).await?;
    assert!(approx_eq(replay.new_balance, 70.0));
    assert!(approx_eq(replay.previous_balance, 100.0));
    assert!(approx_eq(replay.amount, first.amount));
    assert_eq!(replay.station_name, "Central");
    assert_eq!(replay.operation_date, first.operation_date);

    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 70.0));
    assert_eq!(service.list_operations().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn distinct_idempotency_keys_debit_separately() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-1", 100.0).await?;

    let mut request = refuel_request("CARD-1", 10.0);
    request.idempotency_key = Some("key-a".into());
    service.refuel(request.clone()).await?;
    request.idempotency_key = Some("key-b".into());
    service.refuel(request).await?;

    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 80.0));
    assert_eq!(service.list_operations().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn concurrent_refuels_never_overdraw_the_card() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station_and_card(&service, "CARD-9", 100.0).await?;
    let service = Arc::new(service);

    // 8 x 30 liters against a 100 liter balance: exactly 3 can win
    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .refuel(RefuelRequest {
                    card_code: "CARD-9".into(),
                    quantity: 30.0,
                    price: 50.0,
                    code_1c: Some("ST-01".into()),
                    station_name: None,
                    comment: String::new(),
                    idempotency_key: None,
                })
                .await
        }));
    }

    let mut successes = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(receipt) => {
                assert!(receipt.new_balance >= 0.0);
                successes += 1;
            }
            Err(AppError::InsufficientBalance { .. }) => rejected += 1,
            Err(other) => panic!("unexpected refuel error: {other:?}"),
        }
    }
    assert_eq!(successes, 3);
    assert_eq!(rejected, 5);

    let card = service.get_card_by_code("CARD-9").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 10.0));
    assert_eq!(service.list_operations().await?.len(), 3);
    Ok(())
}
