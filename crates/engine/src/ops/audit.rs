use chrono::Utc;
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{AuditEntry, ResultEngine, audit};

use super::Engine;

impl Engine {
    /// Appends an audit row inside the caller's transaction.
    ///
    /// Every mutating operation goes through here; the workflow engine
    /// never reads this table back.
    pub(super) async fn record_audit(
        &self,
        db_tx: &DatabaseTransaction,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        user_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> ResultEngine<()> {
        let entry = audit::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            entity_type: ActiveValue::Set(entity_type.to_string()),
            entity_id: ActiveValue::Set(entity_id),
            action: ActiveValue::Set(action.to_string()),
            user_id: ActiveValue::Set(user_id),
            details_json: ActiveValue::Set(details.to_string()),
            timestamp: ActiveValue::Set(Utc::now()),
        };
        entry.insert(db_tx).await?;
        Ok(())
    }

    /// Lists the audit trail of one entity, newest first.
    pub async fn list_audit(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> ResultEngine<Vec<AuditEntry>> {
        let models = audit::Entity::find()
            .filter(audit::Column::EntityType.eq(entity_type))
            .filter(audit::Column::EntityId.eq(entity_id))
            .order_by_desc(audit::Column::Timestamp)
            .all(&self.database)
            .await?;

        models.into_iter().map(AuditEntry::try_from).collect()
    }
}
