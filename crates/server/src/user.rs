//! Users entity as seen by the HTTP layer.
//!
//! The auth middleware loads this model by email and injects it as a
//! request extension; handlers read company and role from it for
//! authorization checks. Domain writes still go through the engine.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub manager_id: Option<Uuid>,
    pub status: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn is_manager(&self) -> bool {
        self.role == "manager"
    }
}
