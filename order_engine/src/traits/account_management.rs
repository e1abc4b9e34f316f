use crate::{
    db_types::{Balance, BalanceHistoryEntry, Money, User, UserId},
    traits::OrderError,
};

/// Users and their prepaid balances.
///
/// Balance debits and refunds tied to an order only ever happen inside the order's own unit of work (see
/// [`crate::traits::OrderManagement`]). This trait exposes the stand-alone operations: reads, and topping up a balance.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Creates a user with an empty balance.
    async fn create_user(&self, name: &str) -> Result<User, OrderError>;

    async fn fetch_user(&self, user_id: UserId) -> Result<Option<User>, OrderError>;

    async fn fetch_balance(&self, user_id: UserId) -> Result<Option<Balance>, OrderError>;

    /// Adds `amount` to the user's balance and appends a `CHARGE` record. `amount` must be positive.
    async fn charge_balance(&self, user_id: UserId, amount: Money) -> Result<Balance, OrderError>;

    /// The full balance history for the user, oldest first.
    async fn fetch_balance_history(&self, user_id: UserId) -> Result<Vec<BalanceHistoryEntry>, OrderError>;
}
