use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use serde_json::json;
use uuid::Uuid;

use crate::{
    CreateUserCmd, EngineError, ResultEngine, User, UserStatus, companies, users,
    util::normalize_required_name,
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a user inside a company.
    ///
    /// Emails are unique across the whole installation, matching the login
    /// lookup. A new user can point at a manager immediately; a cycle is
    /// impossible at creation since nobody reports to the new user yet.
    pub async fn create_user(&self, cmd: CreateUserCmd) -> ResultEngine<User> {
        let name = normalize_required_name(&cmd.name, "user")?;
        let email = cmd.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(EngineError::InvalidInput(format!(
                "invalid email: {email}"
            )));
        }
        if cmd.password.is_empty() {
            return Err(EngineError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            companies::Entity::find_by_id(cmd.company_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("company not exists".to_string()))?;

            if users::Entity::find()
                .filter(users::Column::Email.eq(email.clone()))
                .one(&db_tx)
                .await?
                .is_some()
            {
                return Err(EngineError::ExistingKey(email.clone()));
            }

            if let Some(manager_id) = cmd.manager_id {
                self.require_company_member(&db_tx, cmd.company_id, manager_id, "manager")
                    .await?;
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            let active = users::ActiveModel {
                id: ActiveValue::Set(id),
                company_id: ActiveValue::Set(cmd.company_id),
                name: ActiveValue::Set(name.clone()),
                email: ActiveValue::Set(email.clone()),
                password: ActiveValue::Set(cmd.password.clone()),
                role: ActiveValue::Set(cmd.role.as_str().to_string()),
                manager_id: ActiveValue::Set(cmd.manager_id),
                status: ActiveValue::Set(UserStatus::Active.as_str().to_string()),
                created_at: ActiveValue::Set(now),
            };
            let model = active.insert(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "user",
                id,
                "created",
                None,
                json!({ "email": email, "role": cmd.role.as_str() }),
            )
            .await?;

            User::try_from(model)
        })
    }

    /// Points `user_id` at a new manager (or clears it with `None`).
    ///
    /// Walks the manager chain upwards from the proposed manager; finding
    /// `user_id` on the way means the assignment would close a cycle and is
    /// refused. Detection happens here, at assignment time, so reads never
    /// traverse the hierarchy.
    pub async fn assign_manager(
        &self,
        user_id: Uuid,
        manager_id: Option<Uuid>,
        acting_user: Uuid,
    ) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let user = users::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

            if let Some(manager_id) = manager_id {
                if manager_id == user_id {
                    return Err(EngineError::ManagerCycle(
                        "user cannot manage themselves".to_string(),
                    ));
                }
                let manager = self
                    .require_company_member(&db_tx, user.company_id, manager_id, "manager")
                    .await?;

                let mut seen = HashSet::from([user_id, manager_id]);
                let mut cursor = manager.manager_id;
                while let Some(ancestor) = cursor {
                    if ancestor == user_id {
                        return Err(EngineError::ManagerCycle(format!(
                            "assigning {manager_id} would close a manager cycle"
                        )));
                    }
                    if !seen.insert(ancestor) {
                        // A cycle already exists above the proposed manager.
                        return Err(EngineError::ManagerCycle(
                            "manager chain already contains a cycle".to_string(),
                        ));
                    }
                    cursor = users::Entity::find_by_id(ancestor)
                        .one(&db_tx)
                        .await?
                        .and_then(|m| m.manager_id);
                }
            }

            let mut active: users::ActiveModel = user.into();
            active.manager_id = ActiveValue::Set(manager_id);
            let updated = active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "user",
                user_id,
                "manager_assigned",
                Some(acting_user),
                json!({ "manager_id": manager_id }),
            )
            .await?;

            User::try_from(updated)
        })
    }

    /// Activates or deactivates a user. Inactive users cannot submit or
    /// decide on expenses.
    pub async fn set_user_status(
        &self,
        user_id: Uuid,
        status: UserStatus,
        acting_user: Uuid,
    ) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let user = users::Entity::find_by_id(user_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

            let mut active: users::ActiveModel = user.into();
            active.status = ActiveValue::Set(status.as_str().to_string());
            let updated = active.update(&db_tx).await?;

            self.record_audit(
                &db_tx,
                "user",
                user_id,
                "status_changed",
                Some(acting_user),
                json!({ "status": status.as_str() }),
            )
            .await?;

            User::try_from(updated)
        })
    }

    /// Returns a user by id.
    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        let model = users::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
        User::try_from(model)
    }

    /// Returns a user by login email.
    pub async fn user_by_email(&self, email: &str) -> ResultEngine<User> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(email.trim().to_lowercase()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
        User::try_from(model)
    }

    /// Lists all users of a company.
    pub async fn list_users(&self, company_id: Uuid) -> ResultEngine<Vec<User>> {
        let models = users::Entity::find()
            .filter(users::Column::CompanyId.eq(company_id))
            .order_by_asc(users::Column::CreatedAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(User::try_from).collect()
    }

    /// Loads a user and checks membership in `company_id`.
    pub(super) async fn require_company_member(
        &self,
        db_tx: &DatabaseTransaction,
        company_id: Uuid,
        user_id: Uuid,
        label: &str,
    ) -> ResultEngine<users::Model> {
        let model = users::Entity::find_by_id(user_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("{label} not exists")))?;
        if model.company_id != company_id {
            return Err(EngineError::KeyNotFound(format!("{label} not exists")));
        }
        Ok(model)
    }
}
