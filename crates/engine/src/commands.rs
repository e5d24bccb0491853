//! Command structs for engine operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Currency, Decision, Role};

/// Create a company.
#[derive(Clone, Debug)]
pub struct CreateCompanyCmd {
    pub name: String,
    pub country: String,
    pub base_currency: Currency,
}

impl CreateCompanyCmd {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        country: impl Into<String>,
        base_currency: Currency,
    ) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            base_currency,
        }
    }
}

/// Create a user inside a company.
#[derive(Clone, Debug)]
pub struct CreateUserCmd {
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub manager_id: Option<Uuid>,
}

impl CreateUserCmd {
    #[must_use]
    pub fn new(
        company_id: Uuid,
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            company_id,
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role,
            manager_id: None,
        }
    }

    #[must_use]
    pub fn manager(mut self, manager_id: Uuid) -> Self {
        self.manager_id = Some(manager_id);
        self
    }
}

/// Create an expense category inside a company.
#[derive(Clone, Debug)]
pub struct CreateCategoryCmd {
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl CreateCategoryCmd {
    #[must_use]
    pub fn new(company_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            company_id,
            name: name.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One approver slot in a [`CreateRuleCmd`].
#[derive(Clone, Copy, Debug)]
pub struct ApproverSpec {
    pub user_id: Uuid,
    /// 0-based slot in the sequence; `None` for override-only approvers.
    pub position: Option<u32>,
    pub required: bool,
    pub can_override: bool,
}

impl ApproverSpec {
    /// Sequence member at `position`, neither required nor overriding.
    #[must_use]
    pub fn at(user_id: Uuid, position: u32) -> Self {
        Self {
            user_id,
            position: Some(position),
            required: false,
            can_override: false,
        }
    }

    /// Approver outside the sequence whose approval alone approves.
    #[must_use]
    pub fn override_only(user_id: Uuid) -> Self {
        Self {
            user_id,
            position: None,
            required: false,
            can_override: true,
        }
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn overriding(mut self) -> Self {
        self.can_override = true;
        self
    }
}

/// Create an approval rule.
#[derive(Clone, Debug)]
pub struct CreateRuleCmd {
    pub company_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub sequential: bool,
    pub is_manager_first: bool,
    pub minimum_percent_approval: Option<u8>,
    pub category_ids: Vec<Uuid>,
    pub approvers: Vec<ApproverSpec>,
}

impl CreateRuleCmd {
    #[must_use]
    pub fn new(company_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            company_id,
            name: name.into(),
            description: None,
            sequential: true,
            is_manager_first: false,
            minimum_percent_approval: None,
            category_ids: Vec::new(),
            approvers: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn parallel(mut self) -> Self {
        self.sequential = false;
        self
    }

    #[must_use]
    pub fn manager_first(mut self) -> Self {
        self.is_manager_first = true;
        self
    }

    #[must_use]
    pub fn minimum_percent(mut self, percent: u8) -> Self {
        self.minimum_percent_approval = Some(percent);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_ids.push(category_id);
        self
    }

    #[must_use]
    pub fn approver(mut self, spec: ApproverSpec) -> Self {
        self.approvers.push(spec);
        self
    }
}

/// Submit an expense for approval.
#[derive(Clone, Debug)]
pub struct SubmitExpenseCmd {
    pub employee_id: Uuid,
    pub category_id: Uuid,
    pub description: String,
    pub amount_original_minor: i64,
    pub currency_original: Currency,
    pub receipt_url: Option<String>,
    pub date_incurred: DateTime<Utc>,
}

impl SubmitExpenseCmd {
    #[must_use]
    pub fn new(
        employee_id: Uuid,
        category_id: Uuid,
        description: impl Into<String>,
        amount_original_minor: i64,
        currency_original: Currency,
        date_incurred: DateTime<Utc>,
    ) -> Self {
        Self {
            employee_id,
            category_id,
            description: description.into(),
            amount_original_minor,
            currency_original,
            receipt_url: None,
            date_incurred,
        }
    }

    #[must_use]
    pub fn receipt_url(mut self, url: impl Into<String>) -> Self {
        self.receipt_url = Some(url.into());
        self
    }
}

/// Record an approver's decision on an expense.
#[derive(Clone, Debug)]
pub struct DecideCmd {
    pub expense_id: Uuid,
    pub approver_id: Uuid,
    pub decision: Decision,
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl DecideCmd {
    #[must_use]
    pub fn new(
        expense_id: Uuid,
        approver_id: Uuid,
        decision: Decision,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            expense_id,
            approver_id,
            decision,
            comment: None,
            decided_at,
        }
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
