//! Users and their prepaid point balances.
use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Balance, BalanceHistoryEntry, Money, User, UserId},
    traits::{AccountManagement, OrderError},
};

/// A user's balance together with its full history, oldest entry first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSummary {
    pub balance: Balance,
    pub history: Vec<BalanceHistoryEntry>,
}

pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, name: &str) -> Result<User, OrderError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(OrderError::ValidationError("A user name is required".into()));
        }
        let user = self.db.create_user(name).await?;
        info!("💰️ Created user #{} ({})", user.id, user.name);
        Ok(user)
    }

    pub async fn user(&self, user_id: UserId) -> Result<User, OrderError> {
        self.db.fetch_user(user_id).await?.ok_or_else(|| OrderError::not_found("User", user_id))
    }

    pub async fn balance(&self, user_id: UserId) -> Result<Balance, OrderError> {
        self.db.fetch_balance(user_id).await?.ok_or_else(|| OrderError::not_found("User", user_id))
    }

    /// Tops up the user's balance. `amount` must be positive.
    pub async fn charge(&self, user_id: UserId, amount: Money) -> Result<Balance, OrderError> {
        if !amount.is_positive() {
            return Err(OrderError::ValidationError(format!("Charge amount must be positive, got {amount}")));
        }
        let balance = self.db.charge_balance(user_id, amount).await?;
        info!("💰️ User #{user_id} charged {amount}. Balance is now {}", balance.amount);
        Ok(balance)
    }

    pub async fn history(&self, user_id: UserId) -> Result<Vec<BalanceHistoryEntry>, OrderError> {
        self.db.fetch_balance_history(user_id).await
    }

    pub async fn points(&self, user_id: UserId) -> Result<PointsSummary, OrderError> {
        let balance = self.balance(user_id).await?;
        let history = self.history(user_id).await?;
        trace!("💰️ User #{user_id} has {} balance history entries", history.len());
        Ok(PointsSummary { balance, history })
    }
}
