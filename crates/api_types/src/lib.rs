use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
    Inr,
    Jpy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

pub mod company {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CompanyView {
        pub id: Uuid,
        pub name: String,
        pub country: String,
        pub base_currency: Currency,
    }

    /// Request body for PATCH /company. Absent fields are left unchanged.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct CompanyUpdate {
        pub name: Option<String>,
        pub country: Option<String>,
        pub base_currency: Option<Currency>,
    }
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserCreate {
        pub name: String,
        pub email: String,
        pub password: String,
        pub role: Role,
        pub manager_id: Option<Uuid>,
    }

    /// Request body for PATCH /users/{id}.
    ///
    /// `manager_id` uses a nested option so "leave unchanged" (absent) and
    /// "clear the manager" (null) stay distinguishable.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct UserUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub manager_id: Option<Option<Uuid>>,
        pub status: Option<UserStatus>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: Uuid,
        pub name: String,
        pub email: String,
        pub role: Role,
        pub manager_id: Option<Uuid>,
        pub status: UserStatus,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UsersResponse {
        pub users: Vec<UserView>,
    }
}

pub mod category {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryCreate {
        pub name: String,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryUpdate {
        pub name: Option<String>,
        pub description: Option<String>,
        pub active: Option<bool>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub active: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoriesResponse {
        pub categories: Vec<CategoryView>,
    }
}

pub mod rule {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleApproverSpec {
        pub user_id: Uuid,
        /// 0-based slot in the approval sequence; omit for override-only
        /// approvers.
        pub position: Option<u32>,
        #[serde(default)]
        pub required: bool,
        #[serde(default)]
        pub can_override: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleCreate {
        pub name: String,
        pub description: Option<String>,
        #[serde(default = "default_sequential")]
        pub sequential: bool,
        #[serde(default)]
        pub is_manager_first: bool,
        pub minimum_percent_approval: Option<u8>,
        #[serde(default)]
        pub category_ids: Vec<Uuid>,
        pub approvers: Vec<RuleApproverSpec>,
    }

    fn default_sequential() -> bool {
        true
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RuleView {
        pub id: Uuid,
        pub name: String,
        pub description: Option<String>,
        pub sequential: bool,
        pub is_manager_first: bool,
        pub minimum_percent_approval: Option<u8>,
        pub category_ids: Vec<Uuid>,
        pub approvers: Vec<RuleApproverSpec>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RulesResponse {
        pub rules: Vec<RuleView>,
    }
}

pub mod expense {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseSubmit {
        pub category_id: Uuid,
        pub description: String,
        pub amount_original_minor: i64,
        pub currency_original: Currency,
        pub receipt_url: Option<String>,
        pub date_incurred: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub employee_id: Uuid,
        pub category_id: Uuid,
        pub description: String,
        pub amount_original_minor: i64,
        pub currency_original: Currency,
        pub amount_converted_minor: i64,
        pub receipt_url: Option<String>,
        pub date_incurred: DateTime<Utc>,
        pub status: ExpenseStatus,
        pub current_step: i32,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseListQuery {
        pub employee_id: Option<Uuid>,
        pub status: Option<ExpenseStatus>,
        pub limit: Option<u64>,
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
        pub next_cursor: Option<String>,
    }
}

pub mod decision {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DecisionCreate {
        pub decision: Decision,
        pub comment: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DecisionRecorded {
        pub action_id: Uuid,
        pub status: ExpenseStatus,
        pub current_step: i32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ActionView {
        pub id: Uuid,
        pub approver_id: Uuid,
        pub step_order: i32,
        pub decision: Decision,
        pub comment: Option<String>,
        pub decided_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ActionsResponse {
        pub actions: Vec<ActionView>,
    }
}

pub mod audit {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AuditQuery {
        pub entity_type: String,
        pub entity_id: Uuid,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuditView {
        pub id: Uuid,
        pub entity_type: String,
        pub entity_id: Uuid,
        pub action: String,
        pub user_id: Option<Uuid>,
        pub details: serde_json::Value,
        pub timestamp: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AuditResponse {
        pub entries: Vec<AuditView>,
    }
}
