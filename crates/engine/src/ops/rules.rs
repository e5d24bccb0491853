use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    ApprovalRule, CreateRuleCmd, EngineError, ResultEngine, RuleApprover, UserStatus, categories,
    companies, rule_approvers, rule_categories, rules,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

impl Engine {
    /// Creates an approval rule.
    ///
    /// Malformed rules are refused here, never discovered during
    /// evaluation: a rule must gate on the manager, name at least one
    /// sequence approver, or name an override approver; sequence positions
    /// must be the contiguous range `0..n` with no duplicate approver.
    pub async fn create_rule(&self, cmd: CreateRuleCmd) -> ResultEngine<ApprovalRule> {
        let name = normalize_required_name(&cmd.name, "rule")?;
        let description = normalize_optional_text(cmd.description.as_deref());

        if let Some(percent) = cmd.minimum_percent_approval
            && percent > 100
        {
            return Err(EngineError::InvalidRule(format!(
                "minimum percent approval must be 0-100, got {percent}"
            )));
        }

        let sequence_len = cmd.approvers.iter().filter(|a| a.position.is_some()).count();
        let has_overrider = cmd.approvers.iter().any(|a| a.can_override);
        if sequence_len == 0 && !has_overrider && !cmd.is_manager_first {
            return Err(EngineError::InvalidRule(
                "rule needs a sequence, an override approver or a manager gate".to_string(),
            ));
        }

        let mut seen_users = HashSet::new();
        let mut positions: Vec<u32> = Vec::with_capacity(sequence_len);
        for spec in &cmd.approvers {
            if !seen_users.insert(spec.user_id) {
                return Err(EngineError::InvalidRule(format!(
                    "duplicate approver {}",
                    spec.user_id
                )));
            }
            if let Some(position) = spec.position {
                positions.push(position);
            }
        }
        positions.sort_unstable();
        for (expected, position) in positions.iter().enumerate() {
            if *position as usize != expected {
                return Err(EngineError::InvalidRule(
                    "sequence positions must be contiguous from 0".to_string(),
                ));
            }
        }

        with_tx!(self, |db_tx| {
            companies::Entity::find_by_id(cmd.company_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("company not exists".to_string()))?;

            for spec in &cmd.approvers {
                let member = self
                    .require_company_member(&db_tx, cmd.company_id, spec.user_id, "approver")
                    .await?;
                if member.status != UserStatus::Active.as_str() {
                    return Err(EngineError::InvalidRule(format!(
                        "approver {} is inactive",
                        spec.user_id
                    )));
                }
            }

            for category_id in &cmd.category_ids {
                let category = categories::Entity::find_by_id(*category_id)
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))?;
                if category.company_id != cmd.company_id {
                    return Err(EngineError::KeyNotFound("category not exists".to_string()));
                }
            }

            let id = Uuid::new_v4();
            let now = Utc::now();
            let active = rules::ActiveModel {
                id: ActiveValue::Set(id),
                company_id: ActiveValue::Set(cmd.company_id),
                name: ActiveValue::Set(name.clone()),
                description: ActiveValue::Set(description.clone()),
                sequential: ActiveValue::Set(cmd.sequential),
                is_manager_first: ActiveValue::Set(cmd.is_manager_first),
                minimum_percent_approval: ActiveValue::Set(
                    cmd.minimum_percent_approval.map(i32::from),
                ),
                created_at: ActiveValue::Set(now),
            };
            let model = active.insert(&db_tx).await?;

            for spec in &cmd.approvers {
                let approver = rule_approvers::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    rule_id: ActiveValue::Set(id),
                    user_id: ActiveValue::Set(spec.user_id),
                    position: ActiveValue::Set(spec.position.map(|p| p as i32)),
                    required: ActiveValue::Set(spec.required),
                    can_override: ActiveValue::Set(spec.can_override),
                };
                approver.insert(&db_tx).await?;
            }

            for category_id in &cmd.category_ids {
                let link = rule_categories::ActiveModel {
                    rule_id: ActiveValue::Set(id),
                    category_id: ActiveValue::Set(*category_id),
                };
                link.insert(&db_tx).await?;
            }

            self.record_audit(
                &db_tx,
                "approval_rule",
                id,
                "created",
                None,
                json!({
                    "name": name,
                    "sequential": cmd.sequential,
                    "is_manager_first": cmd.is_manager_first,
                    "approvers": cmd.approvers.len(),
                }),
            )
            .await?;

            assemble_rule(&db_tx, model).await
        })
    }

    /// Returns a rule by id.
    pub async fn rule(&self, rule_id: Uuid) -> ResultEngine<ApprovalRule> {
        let model = rules::Entity::find_by_id(rule_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("rule not exists".to_string()))?;
        assemble_rule(&self.database, model).await
    }

    /// Lists the rules of a company, newest first.
    pub async fn list_rules(&self, company_id: Uuid) -> ResultEngine<Vec<ApprovalRule>> {
        let models = rules::Entity::find()
            .filter(rules::Column::CompanyId.eq(company_id))
            .order_by_desc(rules::Column::CreatedAt)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(assemble_rule(&self.database, model).await?);
        }
        Ok(out)
    }

    /// Picks the rule governing expenses of `category_id`.
    ///
    /// When several rules list the category, the most recently created one
    /// wins. `None` means the manager-fallback policy applies.
    pub async fn applicable_rule(
        &self,
        company_id: Uuid,
        category_id: Uuid,
    ) -> ResultEngine<Option<ApprovalRule>> {
        self.resolve_rule(&self.database, company_id, category_id)
            .await
    }

    pub(super) async fn resolve_rule<C: ConnectionTrait>(
        &self,
        conn: &C,
        company_id: Uuid,
        category_id: Uuid,
    ) -> ResultEngine<Option<ApprovalRule>> {
        let model = rules::Entity::find()
            .filter(rules::Column::CompanyId.eq(company_id))
            .join(JoinType::InnerJoin, rules::Relation::Categories.def())
            .filter(rule_categories::Column::CategoryId.eq(category_id))
            .order_by_desc(rules::Column::CreatedAt)
            .limit(1)
            .one(conn)
            .await?;

        match model {
            Some(model) => Ok(Some(assemble_rule(conn, model).await?)),
            None => Ok(None),
        }
    }
}

/// Joins the rule row with its approver and category children.
async fn assemble_rule<C: ConnectionTrait>(
    conn: &C,
    model: rules::Model,
) -> ResultEngine<ApprovalRule> {
    let approver_models = rule_approvers::Entity::find()
        .filter(rule_approvers::Column::RuleId.eq(model.id))
        .order_by_asc(rule_approvers::Column::Position)
        .all(conn)
        .await?;

    let mut approvers = Vec::with_capacity(approver_models.len());
    for approver in approver_models {
        let position = match approver.position {
            Some(p) => Some(u32::try_from(p).map_err(|_| {
                EngineError::InvalidRule("negative approver position".to_string())
            })?),
            None => None,
        };
        approvers.push(RuleApprover {
            user_id: approver.user_id,
            position,
            required: approver.required,
            can_override: approver.can_override,
        });
    }

    let category_ids = rule_categories::Entity::find()
        .filter(rule_categories::Column::RuleId.eq(model.id))
        .all(conn)
        .await?
        .into_iter()
        .map(|link| link.category_id)
        .collect();

    let minimum_percent_approval = match model.minimum_percent_approval {
        Some(p) => Some(
            u8::try_from(p)
                .map_err(|_| EngineError::InvalidRule("stored percent out of range".to_string()))?,
        ),
        None => None,
    };

    Ok(ApprovalRule {
        id: model.id,
        company_id: model.company_id,
        name: model.name,
        description: model.description,
        sequential: model.sequential,
        is_manager_first: model.is_manager_first,
        minimum_percent_approval,
        category_ids,
        approvers,
        created_at: model.created_at,
    })
}
