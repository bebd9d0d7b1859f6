//! Administrative CRUD handlers: clients, fuel types, stations, fuel
//! cards, card operations and the login check. JSON shapes follow the
//! admin UI contract: collections are wrapped (`{"clients": [...]}`),
//! single resources too (`{"client": {...}}`), deletes answer
//! `{"success": true}`.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::{
    AppError, CreateClient, CreateOperation, parse_operation_date_lenient,
};
use crate::domain::{Client, FuelType, Liters, Money, OperationKind, Station};
use crate::storage::{CardUpdate, CardWithNames, ClientUpdate, NewCard, OperationWithNames};

use super::{ApiError, AppState};

/// Operation timestamps are shown without seconds in listings.
const LIST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Deserialize)]
pub(super) struct IdQuery {
    id: Option<i64>,
}

#[derive(Serialize)]
pub(super) struct SuccessResponse {
    success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

// ========================
// Authentication
// ========================

#[derive(Deserialize)]
pub(super) struct AuthBody {
    login: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
pub(super) struct AuthResponse {
    success: bool,
    user: UserDto,
}

#[derive(Serialize)]
pub(super) struct UserDto {
    id: i64,
    name: String,
    login: String,
    admin: bool,
}

pub(super) async fn authenticate(
    State(state): State<AppState>,
    Json(body): Json<AuthBody>,
) -> Result<Json<AuthResponse>, ApiError> {
    let service = state.service()?;
    let user = service
        .authenticate(
            body.login.as_deref().unwrap_or_default(),
            body.password.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(AuthResponse {
        success: true,
        user: UserDto {
            id: user.id,
            name: user.name,
            login: user.login,
            admin: user.admin,
        },
    }))
}

// ========================
// Clients
// ========================

#[derive(Serialize)]
pub(super) struct ClientDto {
    id: i64,
    inn: String,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    login: Option<String>,
    admin: bool,
}

impl From<Client> for ClientDto {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            inn: client.inn,
            name: client.name,
            address: client.address,
            phone: client.phone,
            email: client.email,
            login: client.login,
            admin: client.admin,
        }
    }
}

#[derive(Serialize)]
pub(super) struct ClientsResponse {
    clients: Vec<ClientDto>,
}

#[derive(Serialize)]
pub(super) struct ClientResponse {
    client: ClientDto,
}

#[derive(Deserialize)]
pub(super) struct ClientBody {
    id: Option<i64>,
    inn: Option<String>,
    name: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    login: Option<String>,
    password: Option<String>,
    admin: Option<bool>,
}

pub(super) async fn list_clients(
    State(state): State<AppState>,
) -> Result<Json<ClientsResponse>, ApiError> {
    let clients = state.service()?.list_clients().await?;
    Ok(Json(ClientsResponse {
        clients: clients.into_iter().map(ClientDto::from).collect(),
    }))
}

pub(super) async fn create_client(
    State(state): State<AppState>,
    Json(body): Json<ClientBody>,
) -> Result<(StatusCode, Json<ClientResponse>), ApiError> {
    let client = state
        .service()?
        .create_client(CreateClient {
            inn: body.inn.unwrap_or_default(),
            name: body.name.unwrap_or_default(),
            address: body.address,
            phone: body.phone,
            email: body.email,
            login: body.login,
            password: body.password,
            admin: body.admin.unwrap_or(false),
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ClientResponse {
            client: client.into(),
        }),
    ))
}

pub(super) async fn update_client(
    State(state): State<AppState>,
    Json(body): Json<ClientBody>,
) -> Result<Json<ClientResponse>, ApiError> {
    let service = state.service()?;
    let id = body.id.ok_or(AppError::NotFound("Client"))?;
    let client = service
        .update_client(
            id,
            ClientUpdate {
                inn: body.inn.unwrap_or_default(),
                name: body.name.unwrap_or_default(),
                address: body.address,
                phone: body.phone,
                email: body.email,
                login: body.login,
            },
        )
        .await?;
    Ok(Json(ClientResponse {
        client: client.into(),
    }))
}

pub(super) async fn delete_client(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let service = state.service()?;
    let id = query
        .id
        .ok_or_else(|| AppError::InvalidRequest("Client ID is required".into()))?;
    service.delete_client(id).await?;
    Ok(SuccessResponse::ok())
}

// ========================
// Fuel types
// ========================

#[derive(Serialize)]
pub(super) struct FuelTypeDto {
    id: i64,
    name: String,
    code_1c: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<FuelType> for FuelTypeDto {
    fn from(fuel_type: FuelType) -> Self {
        Self {
            id: fuel_type.id,
            name: fuel_type.name,
            code_1c: fuel_type.code_1c,
            created_at: fuel_type.created_at,
        }
    }
}

#[derive(Serialize)]
pub(super) struct FuelTypesResponse {
    fuel_types: Vec<FuelTypeDto>,
}

#[derive(Serialize)]
pub(super) struct FuelTypeResponse {
    fuel_type: FuelTypeDto,
}

#[derive(Deserialize)]
pub(super) struct FuelTypeBody {
    id: Option<i64>,
    name: Option<String>,
    code_1c: Option<String>,
}

pub(super) async fn list_fuel_types(
    State(state): State<AppState>,
) -> Result<Json<FuelTypesResponse>, ApiError> {
    let fuel_types = state.service()?.list_fuel_types().await?;
    Ok(Json(FuelTypesResponse {
        fuel_types: fuel_types.into_iter().map(FuelTypeDto::from).collect(),
    }))
}

pub(super) async fn create_fuel_type(
    State(state): State<AppState>,
    Json(body): Json<FuelTypeBody>,
) -> Result<(StatusCode, Json<FuelTypeResponse>), ApiError> {
    let fuel_type = state
        .service()?
        .create_fuel_type(
            body.name.as_deref().unwrap_or_default(),
            body.code_1c.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(FuelTypeResponse {
            fuel_type: fuel_type.into(),
        }),
    ))
}

pub(super) async fn update_fuel_type(
    State(state): State<AppState>,
    Json(body): Json<FuelTypeBody>,
) -> Result<Json<FuelTypeResponse>, ApiError> {
    let service = state.service()?;
    let id = body.id.ok_or(AppError::NotFound("Fuel type"))?;
    let fuel_type = service
        .update_fuel_type(
            id,
            body.name.as_deref().unwrap_or_default(),
            body.code_1c.as_deref(),
        )
        .await?;
    Ok(Json(FuelTypeResponse {
        fuel_type: fuel_type.into(),
    }))
}

pub(super) async fn delete_fuel_type(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let service = state.service()?;
    let id = query
        .id
        .ok_or_else(|| AppError::InvalidRequest("Fuel type ID required".into()))?;
    service.delete_fuel_type(id).await?;
    Ok(SuccessResponse::ok())
}

// ========================
// Stations
// ========================

#[derive(Serialize)]
pub(super) struct StationDto {
    id: i64,
    name: String,
    code_1c: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Station> for StationDto {
    fn from(station: Station) -> Self {
        Self {
            id: station.id,
            name: station.name,
            code_1c: station.code_1c,
            address: station.address,
            created_at: station.created_at,
        }
    }
}

#[derive(Serialize)]
pub(super) struct StationsResponse {
    stations: Vec<StationDto>,
}

#[derive(Serialize)]
pub(super) struct StationResponse {
    station: StationDto,
}

#[derive(Deserialize)]
pub(super) struct StationBody {
    id: Option<i64>,
    name: Option<String>,
    code_1c: Option<String>,
    address: Option<String>,
}

pub(super) async fn list_stations(
    State(state): State<AppState>,
) -> Result<Json<StationsResponse>, ApiError> {
    let stations = state.service()?.list_stations().await?;
    Ok(Json(StationsResponse {
        stations: stations.into_iter().map(StationDto::from).collect(),
    }))
}

pub(super) async fn create_station(
    State(state): State<AppState>,
    Json(body): Json<StationBody>,
) -> Result<(StatusCode, Json<StationResponse>), ApiError> {
    let station = state
        .service()?
        .create_station(
            body.name.as_deref().unwrap_or_default(),
            body.code_1c.as_deref(),
            body.address.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StationResponse {
            station: station.into(),
        }),
    ))
}

pub(super) async fn update_station(
    State(state): State<AppState>,
    Json(body): Json<StationBody>,
) -> Result<Json<StationResponse>, ApiError> {
    let service = state.service()?;
    let id = body.id.ok_or(AppError::NotFound("Station"))?;
    let station = service
        .update_station(
            id,
            body.name.as_deref().unwrap_or_default(),
            body.code_1c.as_deref(),
            body.address.as_deref(),
        )
        .await?;
    Ok(Json(StationResponse {
        station: station.into(),
    }))
}

pub(super) async fn delete_station(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let service = state.service()?;
    let id = query
        .id
        .ok_or_else(|| AppError::InvalidRequest("Station ID required".into()))?;
    service.delete_station(id).await?;
    Ok(SuccessResponse::ok())
}

// ========================
// Fuel cards
// ========================

#[derive(Serialize)]
pub(super) struct CardDto {
    id: i64,
    card_code: String,
    balance_liters: Liters,
    daily_limit_liters: Option<Liters>,
    pin_code: Option<String>,
    client_name: Option<String>,
    fuel_type: Option<String>,
    client_id: Option<i64>,
    fuel_type_id: Option<i64>,
}

impl From<CardWithNames> for CardDto {
    fn from(entry: CardWithNames) -> Self {
        Self {
            id: entry.card.id,
            card_code: entry.card.card_code,
            balance_liters: entry.card.balance_liters,
            daily_limit_liters: entry.card.daily_limit_liters,
            pin_code: entry.card.pin_code,
            client_name: entry.client_name,
            fuel_type: entry.fuel_type,
            client_id: entry.card.client_id,
            fuel_type_id: entry.card.fuel_type_id,
        }
    }
}

#[derive(Serialize)]
pub(super) struct CardsResponse {
    cards: Vec<CardDto>,
}

#[derive(Serialize)]
pub(super) struct CardResponse {
    card: CardDto,
}

#[derive(Deserialize)]
pub(super) struct CardBody {
    id: Option<i64>,
    card_code: Option<String>,
    client_id: Option<i64>,
    fuel_type_id: Option<i64>,
    balance_liters: Option<Liters>,
    daily_limit_liters: Option<Liters>,
    pin_code: Option<String>,
}

pub(super) async fn list_cards(
    State(state): State<AppState>,
) -> Result<Json<CardsResponse>, ApiError> {
    let cards = state.service()?.list_cards().await?;
    Ok(Json(CardsResponse {
        cards: cards.into_iter().map(CardDto::from).collect(),
    }))
}

pub(super) async fn create_card(
    State(state): State<AppState>,
    Json(body): Json<CardBody>,
) -> Result<(StatusCode, Json<CardResponse>), ApiError> {
    let card = state
        .service()?
        .create_card(NewCard {
            card_code: body.card_code.unwrap_or_default(),
            client_id: body.client_id,
            fuel_type_id: body.fuel_type_id,
            balance_liters: body.balance_liters.unwrap_or(0.0),
            daily_limit_liters: body.daily_limit_liters,
            pin_code: body.pin_code,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CardResponse { card: card.into() })))
}

pub(super) async fn update_card(
    State(state): State<AppState>,
    Json(body): Json<CardBody>,
) -> Result<Json<CardResponse>, ApiError> {
    let service = state.service()?;
    let id = body.id.ok_or(AppError::NotFound("Card"))?;
    let card = service
        .update_card(
            id,
            CardUpdate {
                card_code: body.card_code,
                client_id: body.client_id,
                fuel_type_id: body.fuel_type_id,
                balance_liters: body.balance_liters,
                daily_limit_liters: body.daily_limit_liters,
                pin_code: body.pin_code,
            },
        )
        .await?;
    Ok(Json(CardResponse { card: card.into() }))
}

pub(super) async fn delete_card(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let service = state.service()?;
    let id = query
        .id
        .ok_or_else(|| AppError::InvalidRequest("Card ID required".into()))?;
    service.delete_card(id).await?;
    Ok(SuccessResponse::ok())
}

// ========================
// Card operations
// ========================

#[derive(Serialize)]
pub(super) struct OperationDto {
    id: i64,
    card_code: Option<String>,
    station_name: Option<String>,
    operation_date: String,
    operation_type: String,
    quantity: Liters,
    price: Money,
    amount: Money,
    comment: String,
    fuel_card_id: i64,
    station_id: Option<i64>,
}

impl From<OperationWithNames> for OperationDto {
    fn from(entry: OperationWithNames) -> Self {
        Self {
            id: entry.operation.id,
            card_code: entry.card_code,
            station_name: entry.station_name,
            operation_date: entry
                .operation
                .operation_date
                .format(LIST_DATE_FORMAT)
                .to_string(),
            operation_type: entry.operation.kind.as_str().to_string(),
            quantity: entry.operation.quantity,
            price: entry.operation.price,
            amount: entry.operation.amount,
            comment: entry.operation.comment,
            fuel_card_id: entry.operation.fuel_card_id,
            station_id: entry.operation.station_id,
        }
    }
}

#[derive(Serialize)]
pub(super) struct OperationsResponse {
    operations: Vec<OperationDto>,
}

#[derive(Serialize)]
pub(super) struct OperationResponse {
    operation: OperationDto,
}

#[derive(Deserialize)]
pub(super) struct OperationBody {
    id: Option<i64>,
    card_code: Option<String>,
    station_name: Option<String>,
    operation_date: Option<String>,
    operation_type: Option<String>,
    quantity: Option<Liters>,
    price: Option<Money>,
    amount: Option<Money>,
    comment: Option<String>,
}

impl OperationBody {
    fn into_create(self) -> CreateOperation {
        CreateOperation {
            card_code: self.card_code.unwrap_or_default(),
            station_name: self.station_name,
            operation_date: self
                .operation_date
                .as_deref()
                .and_then(parse_operation_date_lenient),
            kind: OperationKind::from_str(self.operation_type.as_deref().unwrap_or_default()),
            quantity: self.quantity.unwrap_or(0.0),
            price: self.price.unwrap_or(0.0),
            amount: self.amount.unwrap_or(0.0),
            comment: self.comment.unwrap_or_default(),
        }
    }
}

pub(super) async fn list_operations(
    State(state): State<AppState>,
) -> Result<Json<OperationsResponse>, ApiError> {
    let operations = state.service()?.list_operations().await?;
    Ok(Json(OperationsResponse {
        operations: operations.into_iter().map(OperationDto::from).collect(),
    }))
}

pub(super) async fn create_operation(
    State(state): State<AppState>,
    Json(body): Json<OperationBody>,
) -> Result<(StatusCode, Json<OperationResponse>), ApiError> {
    let operation = state.service()?.create_operation(body.into_create()).await?;
    Ok((
        StatusCode::CREATED,
        Json(OperationResponse {
            operation: operation.into(),
        }),
    ))
}

pub(super) async fn update_operation(
    State(state): State<AppState>,
    Json(body): Json<OperationBody>,
) -> Result<Json<OperationResponse>, ApiError> {
    let service = state.service()?;
    let id = body.id.ok_or(AppError::NotFound("Operation"))?;
    let operation = service.update_operation(id, body.into_create()).await?;
    Ok(Json(OperationResponse {
        operation: operation.into(),
    }))
}

pub(super) async fn delete_operation(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let service = state.service()?;
    let id = query
        .id
        .ok_or_else(|| AppError::InvalidRequest("Operation ID required".into()))?;
    service.delete_operation(id).await?;
    Ok(SuccessResponse::ok())
}
