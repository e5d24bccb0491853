//! Immutable audit trail written by every mutating operation.
//!
//! The workflow engine writes here but never reads back; the table exists
//! for operators and compliance, not for evaluation.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub details_json: String,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for AuditEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let details = serde_json::from_str(&model.details_json)
            .map_err(|_| EngineError::InvalidInput("invalid audit details".to_string()))?;
        Ok(Self {
            id: model.id,
            entity_type: model.entity_type,
            entity_id: model.entity_id,
            action: model.action,
            user_id: model.user_id,
            details,
            timestamp: model.timestamp,
        })
    }
}
