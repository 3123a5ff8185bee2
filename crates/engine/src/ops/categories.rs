use sea_orm::{Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Category, ResultEngine, categories};

use super::{Engine, normalize_required_name, with_tx};

impl Engine {
    /// Create a user-owned category. Global categories are seeded by
    /// migrations, not created through the API.
    pub async fn new_category(&self, user_id: &str, name: &str) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "category")?;
        let category = Category {
            id: Uuid::new_v4(),
            user_id: Some(user_id.to_string()),
            name,
        };
        with_tx!(self, |db_tx| {
            categories::ActiveModel::from(&category)
                .insert(&db_tx)
                .await?;
            Ok(category.id)
        })
    }

    /// Every category usable by `user_id`: global ones plus their own.
    pub async fn categories_for_user(&self, user_id: &str) -> ResultEngine<Vec<Category>> {
        with_tx!(self, |db_tx| {
            let models: Vec<categories::Model> = categories::Entity::find()
                .filter(
                    Condition::any()
                        .add(categories::Column::UserId.is_null())
                        .add(categories::Column::UserId.eq(user_id.to_string())),
                )
                .order_by_asc(categories::Column::Name)
                .all(&db_tx)
                .await?;
            models.into_iter().map(Category::try_from).collect()
        })
    }
}
