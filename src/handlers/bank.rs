//! Account and money-movement endpoints.

use serde_json::json;

use super::{BankClient, outcome};
use crate::models::envelope::ResponseEnvelope;
use crate::services::mock_api::{HandlerOutcome, RequestOptions};

impl BankClient {
    /// `GET /api/account/balance`
    pub async fn balance(&self, user_id: &str) -> ResponseEnvelope {
        self.api
            .get(
                "/api/account/balance",
                || {
                    Ok(HandlerOutcome::ok(json!({
                        "balance": self.bank.balance(user_id)
                    })))
                },
                RequestOptions::default(),
            )
            .await
    }

    /// `GET /api/account/details`
    pub async fn account_details(&self, user_id: &str) -> ResponseEnvelope {
        self.api
            .get(
                "/api/account/details",
                || outcome(self.bank.account_details(user_id), "NOT_FOUND"),
                RequestOptions::default(),
            )
            .await
    }

    /// `GET /api/transactions[?limit=N]`
    pub async fn transactions(&self, user_id: &str, limit: Option<usize>) -> ResponseEnvelope {
        let endpoint = match limit {
            Some(limit) => format!("/api/transactions?limit={}", limit),
            None => "/api/transactions".to_string(),
        };
        self.api
            .get(
                &endpoint,
                || {
                    Ok(HandlerOutcome::ok(serde_json::to_value(
                        self.bank.transactions(user_id, limit),
                    )?))
                },
                RequestOptions::default(),
            )
            .await
    }

    /// `POST /api/transfers`
    pub async fn transfer(
        &self,
        from_user_id: &str,
        recipient_account: &str,
        amount: f64,
        description: &str,
    ) -> ResponseEnvelope {
        self.api
            .post(
                "/api/transfers",
                || {
                    outcome(
                        self.bank
                            .transfer(from_user_id, recipient_account, amount, description),
                        "TRANSFER_FAILED",
                    )
                },
                RequestOptions::with_body(json!({
                    "fromUserId": from_user_id,
                    "recipientAccount": recipient_account,
                    "amount": amount,
                    "description": description,
                })),
            )
            .await
    }

    /// `POST /api/account/deposit`
    pub async fn deposit(&self, user_id: &str, amount: f64, description: &str) -> ResponseEnvelope {
        self.api
            .post(
                "/api/account/deposit",
                || outcome(self.bank.deposit(user_id, amount, description), "BAD_REQUEST"),
                RequestOptions::with_body(json!({
                    "userId": user_id,
                    "amount": amount,
                    "description": description,
                })),
            )
            .await
    }
}
