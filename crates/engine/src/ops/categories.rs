use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use uuid::Uuid;

use crate::{
    Category, CreateCategoryCmd, EngineError, ResultEngine, categories, companies,
    util::{normalize_name_key, normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates an expense category. Names are unique per company,
    /// case-insensitively.
    pub async fn create_category(&self, cmd: CreateCategoryCmd) -> ResultEngine<Category> {
        let name = normalize_required_name(&cmd.name, "category")?;
        let name_norm = normalize_name_key(&name);
        let description = normalize_optional_text(cmd.description.as_deref());

        with_tx!(self, |db_tx| {
            companies::Entity::find_by_id(cmd.company_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("company not exists".to_string()))?;

            if categories::Entity::find()
                .filter(categories::Column::CompanyId.eq(cmd.company_id))
                .filter(categories::Column::NameNorm.eq(name_norm.clone()))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(name.clone()));
            }

            let id = Uuid::new_v4();
            let active = categories::ActiveModel {
                id: ActiveValue::Set(id),
                company_id: ActiveValue::Set(cmd.company_id),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(name_norm.clone()),
                description: ActiveValue::Set(description.clone()),
                active: ActiveValue::Set(true),
                created_at: ActiveValue::Set(Utc::now()),
            };
            let model = active.insert(&db_tx).await?;

            self.record_audit(&db_tx, "category", id, "created", None, json!({ "name": name }))
                .await?;

            Category::try_from(model)
        })
    }

    /// Renames, describes or (de)activates a category.
    pub async fn update_category(
        &self,
        category_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
        active: Option<bool>,
        acting_user: Uuid,
    ) -> ResultEngine<Category> {
        with_tx!(self, |db_tx| {
            let model = categories::Entity::find_by_id(category_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;

            let mut update: categories::ActiveModel = model.clone().into();
            if let Some(name) = name {
                let name = normalize_required_name(name, "category")?;
                let name_norm = normalize_name_key(&name);
                let clash = categories::Entity::find()
                    .filter(categories::Column::CompanyId.eq(model.company_id))
                    .filter(categories::Column::NameNorm.eq(name_norm.clone()))
                    .filter(categories::Column::Id.ne(category_id))
                    .one(&db_tx)
                    .await?;
                if clash.is_some() {
                    return Err(EngineError::ExistingKey(name));
                }
                update.name = ActiveValue::Set(name);
                update.name_norm = ActiveValue::Set(name_norm);
            }
            if description.is_some() {
                update.description = ActiveValue::Set(normalize_optional_text(description));
            }
            if let Some(active) = active {
                update.active = ActiveValue::Set(active);
            }
            let updated = update.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "category",
                category_id,
                "updated",
                Some(acting_user),
                json!({ "name": updated.name, "active": updated.active }),
            )
            .await?;

            Category::try_from(updated)
        })
    }

    /// Lists categories of a company; inactive ones only when asked for.
    pub async fn list_categories(
        &self,
        company_id: Uuid,
        include_inactive: bool,
    ) -> ResultEngine<Vec<Category>> {
        let mut query = categories::Entity::find()
            .filter(categories::Column::CompanyId.eq(company_id))
            .order_by_asc(categories::Column::Name);
        if !include_inactive {
            query = query.filter(categories::Column::Active.eq(true));
        }
        let models = query.all(&self.database).await?;
        models.into_iter().map(Category::try_from).collect()
    }
}
