use serde::{Deserialize, Serialize};

pub type ClientId = i64;

/// A client account: the company (or person) owning one or more fuel cards.
/// `inn` is the external tax identifier the 1C side keys on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub inn: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
    /// Argon2 hash string; never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub admin: bool,
}
