use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use serde_json::json;
use uuid::Uuid;

use crate::{
    Company, CreateCompanyCmd, Currency, EngineError, ResultEngine, companies,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a company, the root of every other record.
    pub async fn create_company(&self, cmd: CreateCompanyCmd) -> ResultEngine<Company> {
        let name = normalize_required_name(&cmd.name, "company")?;
        let country = normalize_required_name(&cmd.country, "country")?;

        let id = Uuid::new_v4();
        let now = Utc::now();

        with_tx!(self, |db_tx| {
            let active = companies::ActiveModel {
                id: ActiveValue::Set(id),
                name: ActiveValue::Set(name.clone()),
                country: ActiveValue::Set(country.clone()),
                base_currency: ActiveValue::Set(cmd.base_currency.code().to_string()),
                created_at: ActiveValue::Set(now),
            };
            active.insert(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "company",
                id,
                "created",
                None,
                json!({ "name": name, "base_currency": cmd.base_currency.code() }),
            )
            .await?;

            Ok(Company {
                id,
                name: name.clone(),
                country: country.clone(),
                base_currency: cmd.base_currency,
                created_at: now,
            })
        })
    }

    /// Returns a company by id.
    pub async fn company(&self, company_id: Uuid) -> ResultEngine<Company> {
        let model = companies::Entity::find_by_id(company_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("company not exists".to_string()))?;
        Company::try_from(model)
    }

    /// Updates name/country/base currency of a company.
    ///
    /// Changing the base currency only affects expenses submitted
    /// afterwards; converted amounts are fixed at submission time.
    pub async fn update_company(
        &self,
        company_id: Uuid,
        name: Option<&str>,
        country: Option<&str>,
        base_currency: Option<Currency>,
        acting_user: Uuid,
    ) -> ResultEngine<Company> {
        with_tx!(self, |db_tx| {
            let model = companies::Entity::find_by_id(company_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("company not exists".to_string()))?;

            let mut active: companies::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(normalize_required_name(name, "company")?);
            }
            if let Some(country) = country {
                active.country = ActiveValue::Set(normalize_required_name(country, "country")?);
            }
            if let Some(currency) = base_currency {
                active.base_currency = ActiveValue::Set(currency.code().to_string());
            }
            let updated = active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "company",
                company_id,
                "updated",
                Some(acting_user),
                json!({
                    "name": updated.name,
                    "country": updated.country,
                    "base_currency": updated.base_currency,
                }),
            )
            .await?;

            Company::try_from(updated)
        })
    }
}
