//! Approval rule definitions.
//!
//! A rule names the approvers for the expenses of its categories and how
//! their decisions combine: in a fixed order (`sequential`) or all at once,
//! gated by the employee's direct manager (`is_manager_first`), short-cut by
//! override approvers, or settled early by a percentage threshold.
//!
//! The full rule is assembled from three tables: `approval_rules` plus the
//! `rule_approvers` and `rule_categories` children.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One approver slot of a rule.
///
/// `position` is the 0-based slot in the approval sequence; `None` marks an
/// override-only approver who is never waited on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApprover {
    pub user_id: Uuid,
    pub position: Option<u32>,
    pub required: bool,
    pub can_override: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sequential: bool,
    pub is_manager_first: bool,
    pub minimum_percent_approval: Option<u8>,
    pub category_ids: Vec<Uuid>,
    /// Sequence members first (sorted by position), override-only approvers
    /// after them.
    pub approvers: Vec<RuleApprover>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRule {
    /// Approver ids of the ordered sequence (override-only slots excluded).
    #[must_use]
    pub fn sequence(&self) -> Vec<Uuid> {
        let mut slots: Vec<&RuleApprover> = self
            .approvers
            .iter()
            .filter(|a| a.position.is_some())
            .collect();
        slots.sort_by_key(|a| a.position);
        slots.iter().map(|a| a.user_id).collect()
    }

    #[must_use]
    pub fn approver(&self, user_id: Uuid) -> Option<&RuleApprover> {
        self.approvers.iter().find(|a| a.user_id == user_id)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "approval_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sequential: bool,
    pub is_manager_first: bool,
    pub minimum_percent_approval: Option<i32>,
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
    #[sea_orm(has_many = "super::rule_approvers::Entity")]
    Approvers,
    #[sea_orm(has_many = "super::rule_categories::Entity")]
    Categories,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Company.def()
    }
}

impl Related<super::rule_approvers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approvers.def()
    }
}

impl Related<super::rule_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
