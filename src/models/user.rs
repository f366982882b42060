use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::session::Role;

/// A bank customer as stored in the users collection. The password is
/// plaintext demo data; real credential handling is explicitly out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub account_number: String,
    pub balance: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    TransferOut,
    TransferIn,
    Deposit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub amount: f64,
    pub description: String,
    /// Account number of the other party on transfers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    pub balance_after: f64,
    pub timestamp: DateTime<Utc>,
}
