//! Ownership predicates.
//!
//! Every read and write path resolves ownership through these helpers so the
//! two cannot drift apart. Missing and not-owned both surface as `NotFound`
//! on read paths; mutating paths that must distinguish use
//! [`Engine::require_account_for_write`].

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, accounts, categories};

use super::Engine;

impl Engine {
    pub(super) async fn find_account(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<Option<accounts::Model>> {
        accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// The account, only when it exists and belongs to `user_id`.
    ///
    /// Read paths: absent and not-owned are indistinguishable.
    pub(super) async fn require_account_owner(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<accounts::Model> {
        match self.account_owned_by(db, account_id, user_id).await? {
            Some(model) => Ok(model),
            None => Err(EngineError::NotFound("account".to_string())),
        }
    }

    /// Like [`Engine::require_account_owner`], but for mutating calls where
    /// an existing account owned by someone else is `Unauthorized` and a
    /// dangling reference is a validation failure.
    pub(super) async fn require_account_for_write(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<accounts::Model> {
        let Some(model) = self.find_account(db, account_id).await? else {
            return Err(EngineError::Validation("account not exists".to_string()));
        };
        if model.user_id != user_id {
            return Err(EngineError::Unauthorized(
                "account not owned by user".to_string(),
            ));
        }
        Ok(model)
    }

    /// `Some(model)` only when the account exists and is owned; `None`
    /// otherwise, for list paths that answer with an empty result.
    pub(super) async fn account_owned_by(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<accounts::Model>> {
        Ok(self
            .find_account(db, account_id)
            .await?
            .filter(|model| model.user_id == user_id))
    }

    /// The category, only when it is global or owned by `user_id`.
    pub(super) async fn require_category_usable(
        &self,
        db: &DatabaseTransaction,
        category_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<categories::Model> {
        let model = categories::Entity::find_by_id(category_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::Validation("category not exists".to_string()))?;
        match model.user_id.as_deref() {
            None => Ok(model),
            Some(owner) if owner == user_id => Ok(model),
            Some(_) => Err(EngineError::Validation("category not exists".to_string())),
        }
    }

    pub(super) async fn count_accounts_for_user(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<u64> {
        accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(user_id.to_string()))
            .count(db)
            .await
            .map_err(Into::into)
    }
}
