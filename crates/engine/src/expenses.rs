//! Expense records, the mutable subject of the approval workflow.
//!
//! An expense is created in `pending` at step 0 and is mutated only by the
//! workflow engine. `approved` and `rejected` are absorbing: once there, no
//! further decision is accepted.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal states accept no further approval actions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl TryFrom<&str> for ExpenseStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(EngineError::InvalidInput(format!(
                "invalid expense status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub category_id: Uuid,
    pub description: String,
    pub amount_original_minor: i64,
    pub currency_original: Currency,
    /// Amount in the company base currency, fixed at submission time.
    pub amount_converted_minor: i64,
    pub receipt_url: Option<String>,
    pub date_incurred: DateTime<Utc>,
    pub status: ExpenseStatus,
    /// 0-based index into the rule sequence; meaningful only while the
    /// expense is pending under a sequential rule.
    pub current_step: i32,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub employee_id: Uuid,
    pub category_id: Uuid,
    pub description: String,
    pub amount_original_minor: i64,
    pub currency_original: String,
    pub amount_converted_minor: i64,
    pub receipt_url: Option<String>,
    pub date_incurred: DateTimeUtc,
    pub status: String,
    pub current_step: i32,
    pub version: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Company,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::EmployeeId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Employee,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Category,
    #[sea_orm(has_many = "super::actions::Entity")]
    Actions,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::actions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            company_id: model.company_id,
            employee_id: model.employee_id,
            category_id: model.category_id,
            description: model.description,
            amount_original_minor: model.amount_original_minor,
            currency_original: Currency::try_from(model.currency_original.as_str())?,
            amount_converted_minor: model.amount_converted_minor,
            receipt_url: model.receipt_url,
            date_incurred: model.date_incurred,
            status: ExpenseStatus::try_from(model.status.as_str())?,
            current_step: model.current_step,
            version: model.version,
            created_at: model.created_at,
        })
    }
}
