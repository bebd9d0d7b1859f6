use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::NaiveDateTime;

use crate::config::BusinessTime;
use crate::domain::{
    Card, CardId, Client, ClientId, FuelType, FuelTypeId, Liters, Money, Operation, OperationId,
    OperationKind, Station, StationId,
};
use crate::storage::{
    CardUpdate, CardWithNames, ClientUpdate, NewCard, NewClient, OperationRecord,
    OperationWithNames, Repository,
};

use super::AppError;

/// Application service providing the high-level operations of the
/// fuel-card system. This is the single interface the HTTP layer talks to.
pub struct AppService {
    pub(crate) repo: Repository,
    pub(crate) clock: BusinessTime,
}

/// Successful authentication result; never carries password material.
#[derive(Debug)]
pub struct AuthenticatedUser {
    pub id: ClientId,
    pub name: String,
    pub login: String,
    pub admin: bool,
}

/// Field set for creating a client account through the admin API.
pub struct CreateClient {
    pub inn: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub admin: bool,
}

/// Field set for an administrative ledger entry, before card and station
/// references are resolved.
pub struct CreateOperation {
    pub card_code: String,
    pub station_name: Option<String>,
    pub operation_date: Option<NaiveDateTime>,
    pub kind: OperationKind,
    pub quantity: Liters,
    pub price: Money,
    pub amount: Money,
    pub comment: String,
}

impl AppService {
    pub fn new(repo: Repository, clock: BusinessTime) -> Self {
        Self { repo, clock }
    }

    /// Connect to the database, run migrations and build the service.
    pub async fn init(database_url: &str, clock: BusinessTime) -> Result<Self, AppError> {
        let repo = Repository::init(database_url).await?;
        Ok(Self::new(repo, clock))
    }

    // ========================
    // Authentication
    // ========================

    /// Check a login/password pair against the clients table.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, AppError> {
        let login = login.trim();
        let password = password.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::InvalidRequest(
                "login and password are required".into(),
            ));
        }

        let client = self
            .repo
            .get_client_by_login(login)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let stored = client
            .password_hash
            .as_deref()
            .ok_or(AppError::InvalidCredentials)?;
        if !verify_password(password, stored) {
            return Err(AppError::InvalidCredentials);
        }

        Ok(AuthenticatedUser {
            id: client.id,
            name: client.name,
            login: login.to_string(),
            admin: client.admin,
        })
    }

    // ========================
    // Clients
    // ========================

    pub async fn list_clients(&self) -> Result<Vec<Client>, AppError> {
        Ok(self.repo.list_clients().await?)
    }

    pub async fn create_client(&self, create: CreateClient) -> Result<Client, AppError> {
        if create.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name is required".into()));
        }

        let password_hash = match create.password.as_deref().map(str::trim) {
            Some(password) if !password.is_empty() => Some(hash_password(password)?),
            _ => None,
        };

        let new = NewClient {
            inn: create.inn,
            name: create.name,
            address: create.address,
            phone: create.phone,
            email: create.email,
            login: create.login,
            password_hash,
            admin: create.admin,
        };
        Ok(self.repo.create_client(&new).await?)
    }

    pub async fn update_client(
        &self,
        id: ClientId,
        update: ClientUpdate,
    ) -> Result<Client, AppError> {
        self.repo
            .update_client(id, &update)
            .await?
            .ok_or(AppError::NotFound("Client"))
    }

    pub async fn delete_client(&self, id: ClientId) -> Result<(), AppError> {
        Ok(self.repo.delete_client(id).await?)
    }

    // ========================
    // Fuel types
    // ========================

    pub async fn list_fuel_types(&self) -> Result<Vec<FuelType>, AppError> {
        Ok(self.repo.list_fuel_types().await?)
    }

    pub async fn create_fuel_type(
        &self,
        name: &str,
        code_1c: Option<&str>,
    ) -> Result<FuelType, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name is required".into()));
        }
        Ok(self.repo.create_fuel_type(name, code_1c).await?)
    }

    pub async fn update_fuel_type(
        &self,
        id: FuelTypeId,
        name: &str,
        code_1c: Option<&str>,
    ) -> Result<FuelType, AppError> {
        self.repo
            .update_fuel_type(id, name, code_1c)
            .await?
            .ok_or(AppError::NotFound("Fuel type"))
    }

    pub async fn delete_fuel_type(&self, id: FuelTypeId) -> Result<(), AppError> {
        Ok(self.repo.delete_fuel_type(id).await?)
    }

    // ========================
    // Stations
    // ========================

    pub async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        Ok(self.repo.list_stations().await?)
    }

    pub async fn create_station(
        &self,
        name: &str,
        code_1c: Option<&str>,
        address: Option<&str>,
    ) -> Result<Station, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidRequest("name is required".into()));
        }
        Ok(self.repo.create_station(name, code_1c, address).await?)
    }

    pub async fn update_station(
        &self,
        id: StationId,
        name: &str,
        code_1c: Option<&str>,
        address: Option<&str>,
    ) -> Result<Station, AppError> {
        self.repo
            .update_station(id, name, code_1c, address)
            .await?
            .ok_or(AppError::NotFound("Station"))
    }

    pub async fn delete_station(&self, id: StationId) -> Result<(), AppError> {
        Ok(self.repo.delete_station(id).await?)
    }

    // ========================
    // Fuel cards
    // ========================

    pub async fn list_cards(&self) -> Result<Vec<CardWithNames>, AppError> {
        Ok(self.repo.list_cards().await?)
    }

    pub async fn create_card(&self, new: NewCard) -> Result<CardWithNames, AppError> {
        if new.card_code.trim().is_empty() {
            return Err(AppError::InvalidRequest("card_code is required".into()));
        }
        if new.balance_liters < 0.0 {
            return Err(AppError::InvalidRequest(
                "balance_liters cannot be negative".into(),
            ));
        }
        let id = self.repo.create_card(&new).await?;
        self.repo
            .get_card_with_names(id)
            .await?
            .ok_or(AppError::NotFound("Card"))
    }

    pub async fn update_card(
        &self,
        id: CardId,
        update: CardUpdate,
    ) -> Result<CardWithNames, AppError> {
        if update.is_empty() {
            return Err(AppError::InvalidRequest("No fields to update".into()));
        }
        if update.balance_liters.is_some_and(|balance| balance < 0.0) {
            return Err(AppError::InvalidRequest(
                "balance_liters cannot be negative".into(),
            ));
        }
        if !self.repo.update_card(id, &update).await? {
            return Err(AppError::NotFound("Card"));
        }
        self.repo
            .get_card_with_names(id)
            .await?
            .ok_or(AppError::NotFound("Card"))
    }

    pub async fn delete_card(&self, id: CardId) -> Result<(), AppError> {
        Ok(self.repo.delete_card(id).await?)
    }

    pub async fn get_card_by_code(&self, card_code: &str) -> Result<Option<Card>, AppError> {
        Ok(self.repo.get_card_by_code(card_code).await?)
    }

    // ========================
    // Card operations (administrative ledger entries)
    // ========================

    pub async fn list_operations(&self) -> Result<Vec<OperationWithNames>, AppError> {
        Ok(self.repo.list_operations().await?)
    }

    /// Record a free-form historical entry. Unlike the refuel transaction,
    /// an unresolved station is kept as NULL and the balance is untouched.
    pub async fn create_operation(
        &self,
        create: CreateOperation,
    ) -> Result<OperationWithNames, AppError> {
        let (record, station_name) = self.resolve_operation(create).await?;
        let operation = self.repo.insert_operation(&record).await?;
        Ok(self.with_names(operation, station_name).await?)
    }

    pub async fn update_operation(
        &self,
        id: OperationId,
        update: CreateOperation,
    ) -> Result<OperationWithNames, AppError> {
        let (record, station_name) = self.resolve_operation(update).await?;
        let operation = self
            .repo
            .update_operation(id, &record)
            .await?
            .ok_or(AppError::NotFound("Operation"))?;
        Ok(self.with_names(operation, station_name).await?)
    }

    pub async fn delete_operation(&self, id: OperationId) -> Result<(), AppError> {
        Ok(self.repo.delete_operation(id).await?)
    }

    async fn resolve_operation(
        &self,
        create: CreateOperation,
    ) -> Result<(OperationRecord, Option<String>), AppError> {
        let card_code = create.card_code.trim();
        let card = self
            .repo
            .get_card_by_code(card_code)
            .await?
            .ok_or_else(|| AppError::CardNotFound(card_code.to_string()))?;

        let station = match create.station_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => self.repo.get_station_by_name(name).await?,
            _ => None,
        };
        let station_name = station.as_ref().map(|s| s.name.clone());

        let record = OperationRecord {
            fuel_card_id: card.id,
            station_id: station.map(|s| s.id),
            operation_date: create.operation_date.unwrap_or_else(|| self.clock.now()),
            kind: create.kind,
            quantity: create.quantity,
            price: create.price,
            amount: create.amount,
            comment: create.comment,
        };
        Ok((record, station_name))
    }

    async fn with_names(
        &self,
        operation: Operation,
        station_name: Option<String>,
    ) -> Result<OperationWithNames, AppError> {
        let card_code = self
            .repo
            .get_card_with_names(operation.fuel_card_id)
            .await?
            .map(|c| c.card.card_code);
        Ok(OperationWithNames {
            operation,
            card_code,
            station_name,
        })
    }
}

/// Try the timestamp formats the admin UI has historically sent.
pub fn parse_operation_date_lenient(input: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input.trim(), fmt).ok())
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Database(anyhow::anyhow!("Failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("s3cret", "not-a-phc-string"));
    }

    #[test]
    fn lenient_date_parsing_accepts_known_formats() {
        for input in [
            "2024-05-01T08:30",
            "2024-05-01 08:30",
            "2024-05-01 08:30:00",
        ] {
            let parsed = parse_operation_date_lenient(input).unwrap();
            assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2024-05-01 08:30");
        }
        assert!(parse_operation_date_lenient("yesterday").is_none());
    }
}
