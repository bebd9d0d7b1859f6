use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::domain::{
    Card, CardId, Client, ClientId, FuelType, FuelTypeId, Liters, Money, Operation, OperationId,
    OperationKind, REFUEL, Station, StationId,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_REFUEL_INDEXES};

/// Stored timestamps for operations are business-local wall-clock time.
const OPERATION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A card joined with its owner and fuel type names, for listings.
#[derive(Debug, Clone)]
pub struct CardWithNames {
    pub card: Card,
    pub client_name: Option<String>,
    pub fuel_type: Option<String>,
}

/// Everything the balance inquiry needs about one card, read in one query.
#[derive(Debug, Clone)]
pub struct CardOverview {
    pub card: Card,
    pub fuel_type: Option<String>,
    pub client_name: Option<String>,
    pub client_inn: Option<String>,
}

/// An operation joined with its card code and station name, for listings.
#[derive(Debug, Clone)]
pub struct OperationWithNames {
    pub operation: Operation,
    pub card_code: Option<String>,
    pub station_name: Option<String>,
}

/// A previously committed refuel, looked up by idempotency key so a retry
/// can echo the recorded outcome instead of debiting again.
#[derive(Debug, Clone)]
pub struct RecordedRefuel {
    pub card_code: String,
    pub quantity: Liters,
    pub price: Money,
    pub amount: Money,
    pub operation_date: NaiveDateTime,
    pub station_name: Option<String>,
    pub balance_after: Option<Liters>,
}

/// Outcome of appending a refuel ledger row.
#[derive(Debug)]
pub enum RefuelInsert {
    Inserted(OperationId),
    /// Another request with the same idempotency key committed first.
    DuplicateKey,
}

/// Field set for creating a client. The password arrives already hashed.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub inn: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub password_hash: Option<String>,
    pub admin: bool,
}

/// Full-field client update (the admin UI always sends the whole form).
#[derive(Debug, Clone)]
pub struct ClientUpdate {
    pub inn: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCard {
    pub card_code: String,
    pub client_id: Option<ClientId>,
    pub fuel_type_id: Option<FuelTypeId>,
    pub balance_liters: Liters,
    pub daily_limit_liters: Option<Liters>,
    pub pin_code: Option<String>,
}

/// Partial card update: only fields that are `Some` are written.
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub card_code: Option<String>,
    pub client_id: Option<ClientId>,
    pub fuel_type_id: Option<FuelTypeId>,
    pub balance_liters: Option<Liters>,
    pub daily_limit_liters: Option<Liters>,
    pub pin_code: Option<String>,
}

impl CardUpdate {
    pub fn is_empty(&self) -> bool {
        self.card_code.is_none()
            && self.client_id.is_none()
            && self.fuel_type_id.is_none()
            && self.balance_liters.is_none()
            && self.daily_limit_liters.is_none()
            && self.pin_code.is_none()
    }
}

/// Field set for an administrative ledger entry or a full operation update.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub fuel_card_id: CardId,
    pub station_id: Option<StationId>,
    pub operation_date: NaiveDateTime,
    pub kind: OperationKind,
    pub quantity: Liters,
    pub price: Money,
    pub amount: Money,
    pub comment: String,
}

/// Field set for the refuel transaction's ledger append.
#[derive(Debug, Clone)]
pub struct RefuelRecord {
    pub fuel_card_id: CardId,
    pub station_id: StationId,
    pub operation_date: NaiveDateTime,
    pub quantity: Liters,
    pub price: Money,
    pub amount: Money,
    pub comment: String,
    pub idempotency_key: Option<String>,
    pub balance_after: Liters,
}

/// Repository for persisting and querying the fuel-card tables.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL, creating the file if
    /// needed. WAL mode plus a busy timeout make concurrent refuel
    /// transactions queue on the write lock instead of failing.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_REFUEL_INDEXES)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Begin a transaction. Dropping it without a commit rolls back.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>> {
        self.pool.begin().await.context("Failed to begin transaction")
    }

    // ========================
    // Clients
    // ========================

    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query(
            r#"
            SELECT id, inn, name, address, phone, email, login, password_hash, admin
            FROM clients
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list clients")?;

        rows.iter().map(Self::row_to_client).collect()
    }

    pub async fn get_client_by_login(&self, login: &str) -> Result<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT id, inn, name, address, phone, email, login, password_hash, admin
            FROM clients
            WHERE login = ?
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch client by login")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    pub async fn create_client(&self, new: &NewClient) -> Result<Client> {
        let row = sqlx::query(
            r#"
            INSERT INTO clients (inn, name, address, phone, email, login, password_hash, admin)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, inn, name, address, phone, email, login, password_hash, admin
            "#,
        )
        .bind(&new.inn)
        .bind(&new.name)
        .bind(&new.address)
        .bind(&new.phone)
        .bind(&new.email)
        .bind(&new.login)
        .bind(&new.password_hash)
        .bind(new.admin)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create client")?;

        Self::row_to_client(&row)
    }

    pub async fn update_client(&self, id: ClientId, update: &ClientUpdate) -> Result<Option<Client>> {
        let row = sqlx::query(
            r#"
            UPDATE clients
            SET inn = ?, name = ?, address = ?, phone = ?, email = ?, login = ?
            WHERE id = ?
            RETURNING id, inn, name, address, phone, email, login, password_hash, admin
            "#,
        )
        .bind(&update.inn)
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.phone)
        .bind(&update.email)
        .bind(&update.login)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update client")?;

        row.as_ref().map(Self::row_to_client).transpose()
    }

    pub async fn delete_client(&self, id: ClientId) -> Result<()> {
        sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete client")?;
        Ok(())
    }

    fn row_to_client(row: &SqliteRow) -> Result<Client> {
        Ok(Client {
            id: row.get("id"),
            inn: row.get("inn"),
            name: row.get("name"),
            address: row.get("address"),
            phone: row.get("phone"),
            email: row.get("email"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
            admin: row.get::<i64, _>("admin") != 0,
        })
    }

    // ========================
    // Fuel types
    // ========================

    pub async fn list_fuel_types(&self) -> Result<Vec<FuelType>> {
        let rows = sqlx::query(
            "SELECT id, name, code_1c, created_at FROM fuel_types ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list fuel types")?;

        rows.iter().map(Self::row_to_fuel_type).collect()
    }

    pub async fn create_fuel_type(&self, name: &str, code_1c: Option<&str>) -> Result<FuelType> {
        let row = sqlx::query(
            r#"
            INSERT INTO fuel_types (name, code_1c, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, code_1c, created_at
            "#,
        )
        .bind(name)
        .bind(code_1c)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create fuel type")?;

        Self::row_to_fuel_type(&row)
    }

    pub async fn update_fuel_type(
        &self,
        id: FuelTypeId,
        name: &str,
        code_1c: Option<&str>,
    ) -> Result<Option<FuelType>> {
        let row = sqlx::query(
            r#"
            UPDATE fuel_types
            SET name = ?, code_1c = ?
            WHERE id = ?
            RETURNING id, name, code_1c, created_at
            "#,
        )
        .bind(name)
        .bind(code_1c)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update fuel type")?;

        row.as_ref().map(Self::row_to_fuel_type).transpose()
    }

    pub async fn delete_fuel_type(&self, id: FuelTypeId) -> Result<()> {
        sqlx::query("DELETE FROM fuel_types WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete fuel type")?;
        Ok(())
    }

    fn row_to_fuel_type(row: &SqliteRow) -> Result<FuelType> {
        let created_at_str: String = row.get("created_at");
        Ok(FuelType {
            id: row.get("id"),
            name: row.get("name"),
            code_1c: row.get("code_1c"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Stations
    // ========================

    pub async fn list_stations(&self) -> Result<Vec<Station>> {
        let rows = sqlx::query(
            "SELECT id, name, code_1c, address, created_at FROM stations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list stations")?;

        rows.iter().map(Self::row_to_station).collect()
    }

    pub async fn create_station(
        &self,
        name: &str,
        code_1c: Option<&str>,
        address: Option<&str>,
    ) -> Result<Station> {
        let row = sqlx::query(
            r#"
            INSERT INTO stations (name, code_1c, address, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, code_1c, address, created_at
            "#,
        )
        .bind(name)
        .bind(code_1c)
        .bind(address)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create station")?;

        Self::row_to_station(&row)
    }

    pub async fn update_station(
        &self,
        id: StationId,
        name: &str,
        code_1c: Option<&str>,
        address: Option<&str>,
    ) -> Result<Option<Station>> {
        let row = sqlx::query(
            r#"
            UPDATE stations
            SET name = ?, code_1c = ?, address = ?
            WHERE id = ?
            RETURNING id, name, code_1c, address, created_at
            "#,
        )
        .bind(name)
        .bind(code_1c)
        .bind(address)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update station")?;

        row.as_ref().map(Self::row_to_station).transpose()
    }

    pub async fn delete_station(&self, id: StationId) -> Result<()> {
        sqlx::query("DELETE FROM stations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete station")?;
        Ok(())
    }

    pub async fn get_station_by_name(&self, name: &str) -> Result<Option<Station>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        self.tx_get_station_by_name(&mut conn, name).await
    }

    pub async fn tx_get_station_by_code(
        &self,
        conn: &mut SqliteConnection,
        code_1c: &str,
    ) -> Result<Option<Station>> {
        let row = sqlx::query(
            "SELECT id, name, code_1c, address, created_at FROM stations WHERE code_1c = ? LIMIT 1",
        )
        .bind(code_1c)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch station by code")?;

        row.as_ref().map(Self::row_to_station).transpose()
    }

    pub async fn tx_get_station_by_name(
        &self,
        conn: &mut SqliteConnection,
        name: &str,
    ) -> Result<Option<Station>> {
        let row = sqlx::query(
            "SELECT id, name, code_1c, address, created_at FROM stations WHERE name = ? LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch station by name")?;

        row.as_ref().map(Self::row_to_station).transpose()
    }

    fn row_to_station(row: &SqliteRow) -> Result<Station> {
        let created_at_str: String = row.get("created_at");
        Ok(Station {
            id: row.get("id"),
            name: row.get("name"),
            code_1c: row.get("code_1c"),
            address: row.get("address"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Fuel cards
    // ========================

    pub async fn list_cards(&self) -> Result<Vec<CardWithNames>> {
        let rows = sqlx::query(
            r#"
            SELECT
                fc.id, fc.card_code, fc.client_id, fc.fuel_type_id,
                fc.balance_liters, fc.daily_limit_liters, fc.pin_code,
                c.name AS client_name,
                ft.name AS fuel_type
            FROM fuel_cards fc
            LEFT JOIN clients c ON fc.client_id = c.id
            LEFT JOIN fuel_types ft ON fc.fuel_type_id = ft.id
            ORDER BY fc.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list fuel cards")?;

        rows.iter()
            .map(|row| {
                Ok(CardWithNames {
                    card: Self::row_to_card(row)?,
                    client_name: row.get("client_name"),
                    fuel_type: row.get("fuel_type"),
                })
            })
            .collect()
    }

    pub async fn get_card_with_names(&self, id: CardId) -> Result<Option<CardWithNames>> {
        let row = sqlx::query(
            r#"
            SELECT
                fc.id, fc.card_code, fc.client_id, fc.fuel_type_id,
                fc.balance_liters, fc.daily_limit_liters, fc.pin_code,
                c.name AS client_name,
                ft.name AS fuel_type
            FROM fuel_cards fc
            LEFT JOIN clients c ON fc.client_id = c.id
            LEFT JOIN fuel_types ft ON fc.fuel_type_id = ft.id
            WHERE fc.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch fuel card")?;

        row.map(|row| {
            Ok(CardWithNames {
                card: Self::row_to_card(&row)?,
                client_name: row.get("client_name"),
                fuel_type: row.get("fuel_type"),
            })
        })
        .transpose()
    }

    pub async fn get_card_by_code(&self, card_code: &str) -> Result<Option<Card>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        self.tx_get_card_by_code(&mut conn, card_code).await
    }

    pub async fn create_card(&self, new: &NewCard) -> Result<CardId> {
        let row = sqlx::query(
            r#"
            INSERT INTO fuel_cards
                (card_code, client_id, fuel_type_id, balance_liters, daily_limit_liters, pin_code)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&new.card_code)
        .bind(new.client_id)
        .bind(new.fuel_type_id)
        .bind(new.balance_liters)
        .bind(new.daily_limit_liters)
        .bind(&new.pin_code)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create fuel card")?;

        Ok(row.get("id"))
    }

    /// Apply a partial update; returns false when the card doesn't exist.
    pub async fn update_card(&self, id: CardId, update: &CardUpdate) -> Result<bool> {
        // Build the SET clause from the fields actually supplied
        let mut sets = Vec::new();
        if update.card_code.is_some() {
            sets.push("card_code = ?");
        }
        if update.client_id.is_some() {
            sets.push("client_id = ?");
        }
        if update.fuel_type_id.is_some() {
            sets.push("fuel_type_id = ?");
        }
        if update.balance_liters.is_some() {
            sets.push("balance_liters = ?");
        }
        if update.daily_limit_liters.is_some() {
            sets.push("daily_limit_liters = ?");
        }
        if update.pin_code.is_some() {
            sets.push("pin_code = ?");
        }

        let query = format!("UPDATE fuel_cards SET {} WHERE id = ?", sets.join(", "));

        let mut sql_query = sqlx::query(&query);
        if let Some(ref card_code) = update.card_code {
            sql_query = sql_query.bind(card_code);
        }
        if let Some(client_id) = update.client_id {
            sql_query = sql_query.bind(client_id);
        }
        if let Some(fuel_type_id) = update.fuel_type_id {
            sql_query = sql_query.bind(fuel_type_id);
        }
        if let Some(balance_liters) = update.balance_liters {
            sql_query = sql_query.bind(balance_liters);
        }
        if let Some(daily_limit_liters) = update.daily_limit_liters {
            sql_query = sql_query.bind(daily_limit_liters);
        }
        if let Some(ref pin_code) = update.pin_code {
            sql_query = sql_query.bind(pin_code);
        }

        let result = sql_query
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update fuel card")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_card(&self, id: CardId) -> Result<()> {
        sqlx::query("DELETE FROM fuel_cards WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete fuel card")?;
        Ok(())
    }

    pub async fn tx_get_card_by_code(
        &self,
        conn: &mut SqliteConnection,
        card_code: &str,
    ) -> Result<Option<Card>> {
        let row = sqlx::query(
            r#"
            SELECT id, card_code, client_id, fuel_type_id,
                   balance_liters, daily_limit_liters, pin_code
            FROM fuel_cards
            WHERE card_code = ?
            "#,
        )
        .bind(card_code)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch fuel card by code")?;

        row.as_ref().map(Self::row_to_card).transpose()
    }

    /// The balance-inquiry read: card joined with client and fuel type.
    pub async fn tx_card_overview(
        &self,
        conn: &mut SqliteConnection,
        card_code: &str,
    ) -> Result<Option<CardOverview>> {
        let row = sqlx::query(
            r#"
            SELECT
                fc.id, fc.card_code, fc.client_id, fc.fuel_type_id,
                fc.balance_liters, fc.daily_limit_liters, fc.pin_code,
                ft.name AS fuel_type,
                c.name AS client_name,
                c.inn AS client_inn
            FROM fuel_cards fc
            LEFT JOIN clients c ON fc.client_id = c.id
            LEFT JOIN fuel_types ft ON fc.fuel_type_id = ft.id
            WHERE fc.card_code = ?
            "#,
        )
        .bind(card_code)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch card overview")?;

        row.map(|row| {
            Ok(CardOverview {
                card: Self::row_to_card(&row)?,
                fuel_type: row.get("fuel_type"),
                client_name: row.get("client_name"),
                client_inn: row.get("client_inn"),
            })
        })
        .transpose()
    }

    /// Conditional debit: check-and-decrement as one atomic statement. The
    /// predicate re-checks the balance under the write lock, so two racing
    /// refuels can never both spend the same liters. Returns the card id
    /// and the balance left after the debit, or `None` when the card is
    /// missing or the balance is short.
    pub async fn tx_debit_card(
        &self,
        conn: &mut SqliteConnection,
        card_code: &str,
        quantity: Liters,
    ) -> Result<Option<(CardId, Liters)>> {
        let row = sqlx::query(
            r#"
            UPDATE fuel_cards
            SET balance_liters = balance_liters - ?1
            WHERE card_code = ?2 AND balance_liters >= ?1
            RETURNING id, balance_liters
            "#,
        )
        .bind(quantity)
        .bind(card_code)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to debit card balance")?;

        Ok(row.map(|row| (row.get("id"), row.get("balance_liters"))))
    }

    /// Sum refuel quantities for a card within a half-open local-time window.
    pub async fn tx_sum_refuels(
        &self,
        conn: &mut SqliteConnection,
        card_id: CardId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Liters> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(quantity), 0.0) AS consumed
            FROM card_operations
            WHERE fuel_card_id = ?
              AND operation_type = ?
              AND operation_date >= ?
              AND operation_date < ?
            "#,
        )
        .bind(card_id)
        .bind(REFUEL)
        .bind(fmt_operation_date(from))
        .bind(fmt_operation_date(to))
        .fetch_one(&mut *conn)
        .await
        .context("Failed to sum refuel operations")?;

        Ok(row.get("consumed"))
    }

    fn row_to_card(row: &SqliteRow) -> Result<Card> {
        Ok(Card {
            id: row.get("id"),
            card_code: row.get("card_code"),
            client_id: row.get("client_id"),
            fuel_type_id: row.get("fuel_type_id"),
            balance_liters: row.get("balance_liters"),
            daily_limit_liters: row.get("daily_limit_liters"),
            pin_code: row.get("pin_code"),
        })
    }

    // ========================
    // Card operations (ledger)
    // ========================

    pub async fn list_operations(&self) -> Result<Vec<OperationWithNames>> {
        let rows = sqlx::query(
            r#"
            SELECT
                co.id, co.fuel_card_id, co.station_id, co.operation_date,
                co.operation_type, co.quantity, co.price, co.amount, co.comment,
                co.idempotency_key, co.balance_after,
                fc.card_code,
                s.name AS station_name
            FROM card_operations co
            LEFT JOIN fuel_cards fc ON co.fuel_card_id = fc.id
            LEFT JOIN stations s ON co.station_id = s.id
            ORDER BY co.operation_date DESC, co.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list card operations")?;

        rows.iter()
            .map(|row| {
                Ok(OperationWithNames {
                    operation: Self::row_to_operation(row)?,
                    card_code: row.get("card_code"),
                    station_name: row.get("station_name"),
                })
            })
            .collect()
    }

    /// Insert an administrative ledger entry.
    pub async fn insert_operation(&self, record: &OperationRecord) -> Result<Operation> {
        let row = sqlx::query(
            r#"
            INSERT INTO card_operations
                (fuel_card_id, station_id, operation_date, operation_type,
                 quantity, price, amount, comment)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, fuel_card_id, station_id, operation_date, operation_type,
                      quantity, price, amount, comment, idempotency_key, balance_after
            "#,
        )
        .bind(record.fuel_card_id)
        .bind(record.station_id)
        .bind(fmt_operation_date(record.operation_date))
        .bind(record.kind.as_str())
        .bind(record.quantity)
        .bind(record.price)
        .bind(record.amount)
        .bind(&record.comment)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert card operation")?;

        Self::row_to_operation(&row)
    }

    pub async fn update_operation(
        &self,
        id: OperationId,
        record: &OperationRecord,
    ) -> Result<Option<Operation>> {
        let row = sqlx::query(
            r#"
            UPDATE card_operations
            SET fuel_card_id = ?, station_id = ?, operation_date = ?,
                operation_type = ?, quantity = ?, price = ?, amount = ?, comment = ?
            WHERE id = ?
            RETURNING id, fuel_card_id, station_id, operation_date, operation_type,
                      quantity, price, amount, comment, idempotency_key, balance_after
            "#,
        )
        .bind(record.fuel_card_id)
        .bind(record.station_id)
        .bind(fmt_operation_date(record.operation_date))
        .bind(record.kind.as_str())
        .bind(record.quantity)
        .bind(record.price)
        .bind(record.amount)
        .bind(&record.comment)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update card operation")?;

        row.as_ref().map(Self::row_to_operation).transpose()
    }

    pub async fn delete_operation(&self, id: OperationId) -> Result<()> {
        sqlx::query("DELETE FROM card_operations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete card operation")?;
        Ok(())
    }

    /// Append the ledger row of a refuel. A unique-index hit on the
    /// idempotency key means a concurrent duplicate committed first.
    pub async fn tx_insert_refuel(
        &self,
        conn: &mut SqliteConnection,
        record: &RefuelRecord,
    ) -> Result<RefuelInsert> {
        let result = sqlx::query(
            r#"
            INSERT INTO card_operations
                (fuel_card_id, station_id, operation_date, operation_type,
                 quantity, price, amount, comment, idempotency_key, balance_after)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.fuel_card_id)
        .bind(record.station_id)
        .bind(fmt_operation_date(record.operation_date))
        .bind(REFUEL)
        .bind(record.quantity)
        .bind(record.price)
        .bind(record.amount)
        .bind(&record.comment)
        .bind(&record.idempotency_key)
        .bind(record.balance_after)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(done) => Ok(RefuelInsert::Inserted(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(RefuelInsert::DuplicateKey)
            }
            Err(e) => Err(e).context("Failed to append refuel operation"),
        }
    }

    /// Look up a committed refuel by idempotency key for replay.
    pub async fn find_refuel_by_key(&self, key: &str) -> Result<Option<RecordedRefuel>> {
        let row = sqlx::query(
            r#"
            SELECT
                fc.card_code,
                co.quantity, co.price, co.amount, co.operation_date, co.balance_after,
                s.name AS station_name
            FROM card_operations co
            JOIN fuel_cards fc ON co.fuel_card_id = fc.id
            LEFT JOIN stations s ON co.station_id = s.id
            WHERE co.idempotency_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch refuel by idempotency key")?;

        row.map(|row| {
            let date_str: String = row.get("operation_date");
            Ok(RecordedRefuel {
                card_code: row.get("card_code"),
                quantity: row.get("quantity"),
                price: row.get("price"),
                amount: row.get("amount"),
                operation_date: parse_operation_date(&date_str)?,
                station_name: row.get("station_name"),
                balance_after: row.get("balance_after"),
            })
        })
        .transpose()
    }

    fn row_to_operation(row: &SqliteRow) -> Result<Operation> {
        let kind_str: String = row.get("operation_type");
        let date_str: String = row.get("operation_date");

        Ok(Operation {
            id: row.get("id"),
            fuel_card_id: row.get("fuel_card_id"),
            station_id: row.get("station_id"),
            operation_date: parse_operation_date(&date_str)?,
            kind: OperationKind::from_str(&kind_str),
            quantity: row.get("quantity"),
            price: row.get("price"),
            amount: row.get("amount"),
            comment: row.get("comment"),
            idempotency_key: row.get("idempotency_key"),
            balance_after: row.get("balance_after"),
        })
    }
}

fn fmt_operation_date(dt: NaiveDateTime) -> String {
    dt.format(OPERATION_DATE_FORMAT).to_string()
}

fn parse_operation_date(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, OPERATION_DATE_FORMAT)
        .context("Invalid operation_date timestamp")
}
