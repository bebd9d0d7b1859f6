mod common;

use anyhow::Result;
use common::{Seed, approx_eq, test_service};
use fuelcard::application::{AppError, CreateClient, CreateOperation};
use fuelcard::domain::OperationKind;
use fuelcard::storage::{CardUpdate, ClientUpdate, NewCard};

fn sample_client(login: Option<&str>, password: Option<&str>) -> CreateClient {
    CreateClient {
        inn: "7701234567".into(),
        name: "Transport LLC".into(),
        address: Some("Moscow".into()),
        phone: None,
        email: None,
        login: login.map(String::from),
        password: password.map(String::from),
        admin: false,
    }
}

#[tokio::test]
async fn client_crud_roundtrip() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let client = service
        .create_client(sample_client(Some("transport"), Some("s3cret")))
        .await?;
    assert_eq!(client.name, "Transport LLC");

    let clients = service.list_clients().await?;
    assert_eq!(clients.len(), 1);

    let updated = service
        .update_client(
            client.id,
            ClientUpdate {
                inn: "7709999999".into(),
                name: "Transport LLC (renamed)".into(),
                address: None,
                phone: Some("+7 495 000-00-00".into()),
                email: None,
                login: Some("transport".into()),
            },
        )
        .await?;
    assert_eq!(updated.name, "Transport LLC (renamed)");
    assert_eq!(updated.inn, "7709999999");

    service.delete_client(client.id).await?;
    assert!(service.list_clients().await?.is_empty());

    let err = service
        .update_client(
            client.id,
            ClientUpdate {
                inn: String::new(),
                name: "ghost".into(),
                address: None,
                phone: None,
                email: None,
                login: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Client")));
    Ok(())
}

#[tokio::test]
async fn client_without_a_name_is_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let mut create = sample_client(None, None);
    create.name = "  ".into();
    let err = service.create_client(create).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
    Ok(())
}

#[tokio::test]
async fn authentication_verifies_hashed_passwords() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let created = service
        .create_client(sample_client(Some("transport"), Some("s3cret")))
        .await?;

    // The stored credential is a hash, not the password itself
    assert_ne!(created.password_hash.as_deref(), Some("s3cret"));

    let user = service.authenticate("transport", "s3cret").await?;
    assert_eq!(user.login, "transport");
    assert!(!user.admin);

    let err = service.authenticate("transport", "wrong").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    let err = service.authenticate("nobody", "s3cret").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    let err = service.authenticate("", "").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
    Ok(())
}

#[tokio::test]
async fn fuel_type_and_station_crud() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let fuel_type = service.create_fuel_type("AI-95", Some("FT-95")).await?;
    let updated = service
        .update_fuel_type(fuel_type.id, "AI-98", Some("FT-98"))
        .await?;
    assert_eq!(updated.name, "AI-98");
    assert_eq!(service.list_fuel_types().await?.len(), 1);
    service.delete_fuel_type(fuel_type.id).await?;
    assert!(service.list_fuel_types().await?.is_empty());

    let station = service
        .create_station("Central", Some("ST-01"), Some("Main street 1"))
        .await?;
    let updated = service
        .update_station(station.id, "Central", Some("ST-01"), Some("Main street 2"))
        .await?;
    assert_eq!(updated.address.as_deref(), Some("Main street 2"));

    let err = service
        .update_station(9999, "ghost", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Station")));

    service.delete_station(station.id).await?;
    assert!(service.list_stations().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn card_partial_update_touches_only_supplied_fields() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let card_id = Seed::card(&service, "CARD-1", 100.0, Some(20.0)).await?;

    let updated = service
        .update_card(
            card_id,
            CardUpdate {
                balance_liters: Some(250.0),
                ..CardUpdate::default()
            },
        )
        .await?;
    assert!(approx_eq(updated.card.balance_liters, 250.0));
    assert_eq!(updated.card.card_code, "CARD-1");
    assert_eq!(updated.card.daily_limit_liters, Some(20.0));

    let err = service
        .update_card(card_id, CardUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let err = service
        .update_card(
            card_id,
            CardUpdate {
                balance_liters: Some(-1.0),
                ..CardUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let err = service
        .update_card(
            9999,
            CardUpdate {
                balance_liters: Some(1.0),
                ..CardUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Card")));
    Ok(())
}

#[tokio::test]
async fn card_create_requires_a_code_and_joins_names() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .create_card(NewCard {
            card_code: " ".into(),
            client_id: None,
            fuel_type_id: None,
            balance_liters: 0.0,
            daily_limit_liters: None,
            pin_code: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    let client = service.create_client(sample_client(None, None)).await?;
    let fuel_type = service.create_fuel_type("DT", None).await?;
    let card = service
        .create_card(NewCard {
            card_code: "CARD-7".into(),
            client_id: Some(client.id),
            fuel_type_id: Some(fuel_type.id),
            balance_liters: 10.0,
            daily_limit_liters: None,
            pin_code: Some("0000".into()),
        })
        .await?;
    assert_eq!(card.client_name.as_deref(), Some("Transport LLC"));
    assert_eq!(card.fuel_type.as_deref(), Some("DT"));
    Ok(())
}

#[tokio::test]
async fn operation_entries_resolve_card_and_station_leniently() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station(&service, "Central", "ST-01").await?;
    Seed::card(&service, "CARD-1", 100.0, None).await?;

    // Unknown card: hard failure
    let err = service
        .create_operation(CreateOperation {
            card_code: "NO-SUCH-CARD".into(),
            station_name: Some("Central".into()),
            operation_date: None,
            kind: OperationKind::Refuel,
            quantity: 5.0,
            price: 50.0,
            amount: 250.0,
            comment: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CardNotFound(_)));

    // Unknown station: kept as a null reference, these are free-form records
    let entry = service
        .create_operation(CreateOperation {
            card_code: "CARD-1".into(),
            station_name: Some("No Such Station".into()),
            operation_date: None,
            kind: OperationKind::Other("correction".into()),
            quantity: 5.0,
            price: 0.0,
            amount: 0.0,
            comment: "manual entry".into(),
        })
        .await?;
    assert_eq!(entry.station_name, None);
    assert_eq!(entry.operation.station_id, None);
    assert_eq!(entry.card_code.as_deref(), Some("CARD-1"));

    // An administrative entry never touches the balance
    let card = service.get_card_by_code("CARD-1").await?.unwrap();
    assert!(approx_eq(card.balance_liters, 100.0));
    Ok(())
}

#[tokio::test]
async fn operation_update_and_delete() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station(&service, "Central", "ST-01").await?;
    Seed::card(&service, "CARD-1", 100.0, None).await?;

    let entry = service
        .create_operation(CreateOperation {
            card_code: "CARD-1".into(),
            station_name: Some("Central".into()),
            operation_date: None,
            kind: OperationKind::Refuel,
            quantity: 5.0,
            price: 50.0,
            amount: 250.0,
            comment: String::new(),
        })
        .await?;

    let updated = service
        .update_operation(
            entry.operation.id,
            CreateOperation {
                card_code: "CARD-1".into(),
                station_name: Some("Central".into()),
                operation_date: None,
                kind: OperationKind::Refuel,
                quantity: 7.0,
                price: 50.0,
                amount: 350.0,
                comment: "corrected".into(),
            },
        )
        .await?;
    assert!(approx_eq(updated.operation.quantity, 7.0));
    assert_eq!(updated.operation.comment, "corrected");

    let err = service
        .update_operation(
            9999,
            CreateOperation {
                card_code: "CARD-1".into(),
                station_name: None,
                operation_date: None,
                kind: OperationKind::Refuel,
                quantity: 1.0,
                price: 1.0,
                amount: 1.0,
                comment: String::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Operation")));

    service.delete_operation(entry.operation.id).await?;
    assert!(service.list_operations().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn operations_list_newest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;
    Seed::station(&service, "Central", "ST-01").await?;
    Seed::card(&service, "CARD-1", 100.0, None).await?;

    for (quantity, date) in [(1.0, "2024-05-01 08:00"), (2.0, "2024-05-02 08:00")] {
        service
            .create_operation(CreateOperation {
                card_code: "CARD-1".into(),
                station_name: Some("Central".into()),
                operation_date: fuelcard::application::parse_operation_date_lenient(date),
                kind: OperationKind::Refuel,
                quantity,
                price: 50.0,
                amount: quantity * 50.0,
                comment: String::new(),
            })
            .await?;
    }

    let operations = service.list_operations().await?;
    assert_eq!(operations.len(), 2);
    assert!(approx_eq(operations[0].operation.quantity, 2.0));
    assert!(approx_eq(operations[1].operation.quantity, 1.0));
    Ok(())
}
