use chrono::Utc;
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Account, EngineError, ResultEngine, accounts};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Create an account for `user_id`, subject to the configured cap.
    ///
    /// The opening balance becomes part of the ledger invariant baseline:
    /// accounts start at zero and any opening amount is expected to arrive
    /// as a regular entry, so the balance always equals the entry sum.
    pub async fn new_account(&self, user_id: &str, name: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "account")?;
        let user_id = user_id.to_string();
        with_tx!(self, |db_tx| {
            let count = self.count_accounts_for_user(&db_tx, &user_id).await?;
            if count >= u64::from(self.limits.max_allowed_accounts) {
                return Err(EngineError::LimitExceeded(format!(
                    "user has reached the maximum of {} accounts",
                    self.limits.max_allowed_accounts
                )));
            }

            let account = Account {
                id: Uuid::new_v4(),
                user_id: user_id.clone(),
                name,
                balance_minor: 0,
                created_at: Utc::now(),
            };
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            Ok(account.id)
        })
    }

    /// The account, when owned by `user_id`.
    pub async fn account(&self, user_id: &str, account_id: Uuid) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_account_owner(&db_tx, account_id, user_id)
                .await?;
            Account::try_from(model)
        })
    }

    pub async fn accounts_for_user(&self, user_id: &str) -> ResultEngine<Vec<Account>> {
        with_tx!(self, |db_tx| {
            let models: Vec<accounts::Model> = accounts::Entity::find()
                .filter(accounts::Column::UserId.eq(user_id.to_string()))
                .order_by_asc(accounts::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            models.into_iter().map(Account::try_from).collect()
        })
    }
}
