//! Account and money-movement operations. Reads and writes go through the
//! injected store; validation failures are domain errors that callers turn
//! into 400-class envelopes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::models::user::{Transaction, TxType, User};
use crate::services::{DomainError, DomainResult};
use crate::storage::{KeyValueStore, get_json, keys, set_json};
use crate::utils::ids::entity_id;

pub struct BankService {
    store: Arc<dyn KeyValueStore>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub account_number: String,
    pub full_name: String,
    pub balance: f64,
    pub currency: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// What a completed transfer or deposit reports back: the ledger entry on
/// the caller's side plus their resulting balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction: Transaction,
    pub new_balance: f64,
}

impl BankService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn users(&self) -> Vec<User> {
        get_json(self.store.as_ref(), keys::USERS).unwrap_or_default()
    }

    fn transactions_all(&self) -> Vec<Transaction> {
        get_json(self.store.as_ref(), keys::TRANSACTIONS).unwrap_or_default()
    }

    fn save_users(&self, users: &[User]) -> DomainResult<()> {
        set_json(self.store.as_ref(), keys::USERS, &users)?;
        Ok(())
    }

    fn save_transactions(&self, transactions: &[Transaction]) -> DomainResult<()> {
        set_json(self.store.as_ref(), keys::TRANSACTIONS, &transactions)?;
        Ok(())
    }

    /// Current balance; an unknown user reads as zero, matching an empty
    /// statement rather than an error.
    pub fn balance(&self, user_id: &str) -> f64 {
        self.users()
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.balance)
            .unwrap_or(0.0)
    }

    pub fn account_details(&self, user_id: &str) -> DomainResult<AccountDetails> {
        let users = self.users();
        let user = users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(DomainError::AccountNotFound)?;
        Ok(AccountDetails {
            account_number: user.account_number.clone(),
            full_name: user.full_name.clone(),
            balance: user.balance,
            currency: user.currency.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        })
    }

    /// A user's ledger entries, newest first, optionally truncated.
    pub fn transactions(&self, user_id: &str, limit: Option<usize>) -> Vec<Transaction> {
        let mut entries: Vec<Transaction> = self
            .transactions_all()
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }

    /// Move money to another account. Validation order: amount, sender,
    /// funds, recipient, self-transfer. Writes both balances and a ledger
    /// entry per side.
    pub fn transfer(
        &self,
        from_user_id: &str,
        recipient_account: &str,
        amount: f64,
        description: &str,
    ) -> DomainResult<Receipt> {
        if !(amount > 0.0) {
            return Err(DomainError::NonPositiveAmount);
        }

        let mut users = self.users();

        let sender_idx = users
            .iter()
            .position(|u| u.id == from_user_id)
            .ok_or(DomainError::SenderNotFound)?;
        if users[sender_idx].balance < amount {
            return Err(DomainError::InsufficientBalance);
        }

        let recipient_idx = users
            .iter()
            .position(|u| u.account_number == recipient_account)
            .ok_or(DomainError::RecipientNotFound)?;
        if sender_idx == recipient_idx {
            return Err(DomainError::SelfTransfer);
        }

        users[sender_idx].balance -= amount;
        users[recipient_idx].balance += amount;

        let now = Utc::now();
        let sender_entry = Transaction {
            id: entity_id("txn"),
            user_id: users[sender_idx].id.clone(),
            tx_type: TxType::TransferOut,
            amount,
            description: description.to_string(),
            counterparty: Some(users[recipient_idx].account_number.clone()),
            balance_after: users[sender_idx].balance,
            timestamp: now,
        };
        let recipient_entry = Transaction {
            id: entity_id("txn"),
            user_id: users[recipient_idx].id.clone(),
            tx_type: TxType::TransferIn,
            amount,
            description: description.to_string(),
            counterparty: Some(users[sender_idx].account_number.clone()),
            balance_after: users[recipient_idx].balance,
            timestamp: now,
        };

        let new_balance = users[sender_idx].balance;
        self.save_users(&users)?;

        let mut transactions = self.transactions_all();
        transactions.push(sender_entry.clone());
        transactions.push(recipient_entry);
        self.save_transactions(&transactions)?;

        info!(
            from = %from_user_id,
            to_account = %recipient_account,
            amount,
            "transfer_completed"
        );

        Ok(Receipt {
            transaction: sender_entry,
            new_balance,
        })
    }

    pub fn deposit(&self, user_id: &str, amount: f64, description: &str) -> DomainResult<Receipt> {
        if !(amount > 0.0) {
            return Err(DomainError::NonPositiveAmount);
        }

        let mut users = self.users();
        let user_idx = users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or(DomainError::AccountNotFound)?;

        users[user_idx].balance += amount;
        let entry = Transaction {
            id: entity_id("txn"),
            user_id: users[user_idx].id.clone(),
            tx_type: TxType::Deposit,
            amount,
            description: description.to_string(),
            counterparty: None,
            balance_after: users[user_idx].balance,
            timestamp: Utc::now(),
        };
        let new_balance = users[user_idx].balance;

        self.save_users(&users)?;
        let mut transactions = self.transactions_all();
        transactions.push(entry.clone());
        self.save_transactions(&transactions)?;

        info!(user_id = %user_id, amount, "deposit_completed");

        Ok(Receipt {
            transaction: entry,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::utils::seeder::seed_data;
    use pretty_assertions::assert_eq;

    fn service() -> BankService {
        let store = Arc::new(MemoryStore::new());
        seed_data(store.as_ref()).expect("seed");
        BankService::new(store)
    }

    #[test]
    fn seeded_balances_are_visible() {
        let bank = service();
        assert_eq!(bank.balance("user_001"), 15_000.0);
        assert_eq!(bank.balance("nobody"), 0.0);
    }

    #[test]
    fn transfer_moves_money_and_writes_both_ledger_entries() {
        let bank = service();
        let receipt = bank
            .transfer("user_001", "9876543210", 250.0, "Rent")
            .expect("transfer");

        assert_eq!(receipt.new_balance, 14_750.0);
        assert_eq!(receipt.transaction.tx_type, TxType::TransferOut);
        assert_eq!(receipt.transaction.counterparty.as_deref(), Some("9876543210"));

        assert_eq!(bank.balance("user_001"), 14_750.0);
        assert_eq!(bank.balance("user_002"), 8_450.0);

        let incoming = bank.transactions("user_002", None);
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].tx_type, TxType::TransferIn);
        assert_eq!(incoming[0].balance_after, 8_450.0);
    }

    #[test]
    fn transfer_validation_order() {
        let bank = service();

        assert!(matches!(
            bank.transfer("user_001", "9876543210", 0.0, ""),
            Err(DomainError::NonPositiveAmount)
        ));
        assert!(matches!(
            bank.transfer("ghost", "9876543210", 10.0, ""),
            Err(DomainError::SenderNotFound)
        ));
        assert!(matches!(
            bank.transfer("user_001", "9876543210", 1_000_000.0, ""),
            Err(DomainError::InsufficientBalance)
        ));
        assert!(matches!(
            bank.transfer("user_001", "0000000000", 10.0, ""),
            Err(DomainError::RecipientNotFound)
        ));
        assert!(matches!(
            bank.transfer("user_001", "1234567890", 10.0, ""),
            Err(DomainError::SelfTransfer)
        ));

        // Nothing moved.
        assert_eq!(bank.balance("user_001"), 15_000.0);
        assert_eq!(bank.balance("user_002"), 8_200.0);
    }

    #[test]
    fn deposit_increases_balance_and_appends_entry() {
        let bank = service();
        let receipt = bank.deposit("user_002", 99.5, "Top up").expect("deposit");
        assert_eq!(receipt.new_balance, 8_299.5);

        let entries = bank.transactions("user_002", None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tx_type, TxType::Deposit);
        assert_eq!(entries[0].counterparty, None);
    }

    #[test]
    fn transactions_are_newest_first_and_limited() {
        let bank = service();
        bank.deposit("user_001", 1.0, "first").expect("deposit");
        bank.deposit("user_001", 2.0, "second").expect("deposit");
        bank.deposit("user_001", 3.0, "third").expect("deposit");

        let all = bank.transactions("user_001", None);
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let limited = bank.transactions("user_001", Some(2));
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn account_details_for_unknown_user_is_a_domain_error() {
        let bank = service();
        assert!(matches!(
            bank.account_details("ghost"),
            Err(DomainError::AccountNotFound)
        ));

        let details = bank.account_details("user_001").expect("details");
        assert_eq!(details.account_number, "1234567890");
        assert_eq!(details.currency, "USD");
    }
}
