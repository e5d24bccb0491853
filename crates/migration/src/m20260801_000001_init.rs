//! Initial schema migration - creates all tables from scratch.
//!
//! It creates the complete schema for Rimborso:
//!
//! - `companies`: tenant roots, one per customer
//! - `users`: accounts with roles and a self-referential manager pointer
//! - `categories`: expense categories per company
//! - `approval_rules`: workflow definitions
//! - `rule_approvers`: approver slots of a rule (sequence + overrides)
//! - `rule_categories`: categories a rule applies to
//! - `expenses`: submitted expenses with workflow state
//! - `approval_actions`: append-only decision log
//! - `audit_logs`: immutable audit trail

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Companies {
    Table,
    Id,
    Name,
    Country,
    BaseCurrency,
    CreatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    CompanyId,
    Name,
    Email,
    Password,
    Role,
    ManagerId,
    Status,
    CreatedAt,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    CompanyId,
    Name,
    NameNorm,
    Description,
    Active,
    CreatedAt,
}

#[derive(Iden)]
enum ApprovalRules {
    Table,
    Id,
    CompanyId,
    Name,
    Description,
    Sequential,
    IsManagerFirst,
    MinimumPercentApproval,
    CreatedAt,
}

#[derive(Iden)]
enum RuleApprovers {
    Table,
    Id,
    RuleId,
    UserId,
    Position,
    Required,
    CanOverride,
}

#[derive(Iden)]
enum RuleCategories {
    Table,
    RuleId,
    CategoryId,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    CompanyId,
    EmployeeId,
    CategoryId,
    Description,
    AmountOriginalMinor,
    CurrencyOriginal,
    AmountConvertedMinor,
    ReceiptUrl,
    DateIncurred,
    Status,
    CurrentStep,
    Version,
    CreatedAt,
}

#[derive(Iden)]
enum ApprovalActions {
    Table,
    Id,
    ExpenseId,
    ApproverId,
    StepOrder,
    Decision,
    Comment,
    DecidedAt,
}

#[derive(Iden)]
enum AuditLogs {
    Table,
    Id,
    EntityType,
    EntityId,
    Action,
    UserId,
    DetailsJson,
    Timestamp,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Companies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Companies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Companies::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Companies::Name).string().not_null())
                    .col(ColumnDef::new(Companies::Country).string().not_null())
                    .col(
                        ColumnDef::new(Companies::BaseCurrency)
                            .string()
                            .not_null()
                            .default("EUR"),
                    )
                    .col(ColumnDef::new(Companies::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(ColumnDef::new(Users::Role).string().not_null())
                    .col(ColumnDef::new(Users::ManagerId).uuid())
                    .col(
                        ColumnDef::new(Users::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Users::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-users-company_id")
                            .from(Users::Table, Users::CompanyId)
                            .to(Companies::Table, Companies::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-users-manager_id")
                            .from(Users::Table, Users::ManagerId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-users-email-unique")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::NameNorm).string().not_null())
                    .col(ColumnDef::new(Categories::Description).string())
                    .col(ColumnDef::new(Categories::Active).boolean().not_null())
                    .col(ColumnDef::new(Categories::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-company_id")
                            .from(Categories::Table, Categories::CompanyId)
                            .to(Companies::Table, Companies::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-company_id-name_norm-unique")
                    .table(Categories::Table)
                    .col(Categories::CompanyId)
                    .col(Categories::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Approval rules
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ApprovalRules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalRules::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalRules::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ApprovalRules::Name).string().not_null())
                    .col(ColumnDef::new(ApprovalRules::Description).string())
                    .col(
                        ColumnDef::new(ApprovalRules::Sequential)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalRules::IsManagerFirst)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalRules::MinimumPercentApproval).integer())
                    .col(
                        ColumnDef::new(ApprovalRules::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_rules-company_id")
                            .from(ApprovalRules::Table, ApprovalRules::CompanyId)
                            .to(Companies::Table, Companies::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Rule approvers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(RuleApprovers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RuleApprovers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RuleApprovers::RuleId).uuid().not_null())
                    .col(ColumnDef::new(RuleApprovers::UserId).uuid().not_null())
                    .col(ColumnDef::new(RuleApprovers::Position).integer())
                    .col(ColumnDef::new(RuleApprovers::Required).boolean().not_null())
                    .col(
                        ColumnDef::new(RuleApprovers::CanOverride)
                            .boolean()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rule_approvers-rule_id")
                            .from(RuleApprovers::Table, RuleApprovers::RuleId)
                            .to(ApprovalRules::Table, ApprovalRules::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rule_approvers-user_id")
                            .from(RuleApprovers::Table, RuleApprovers::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-rule_approvers-rule_id-user_id-unique")
                    .table(RuleApprovers::Table)
                    .col(RuleApprovers::RuleId)
                    .col(RuleApprovers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Rule categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(RuleCategories::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RuleCategories::RuleId).uuid().not_null())
                    .col(ColumnDef::new(RuleCategories::CategoryId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(RuleCategories::RuleId)
                            .col(RuleCategories::CategoryId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rule_categories-rule_id")
                            .from(RuleCategories::Table, RuleCategories::RuleId)
                            .to(ApprovalRules::Table, ApprovalRules::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rule_categories-category_id")
                            .from(RuleCategories::Table, RuleCategories::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::CategoryId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::Description).string().not_null())
                    .col(
                        ColumnDef::new(Expenses::AmountOriginalMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::CurrencyOriginal)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::AmountConvertedMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Expenses::ReceiptUrl).string())
                    .col(ColumnDef::new(Expenses::DateIncurred).timestamp().not_null())
                    .col(
                        ColumnDef::new(Expenses::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Expenses::CurrentStep)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Expenses::Version)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-company_id")
                            .from(Expenses::Table, Expenses::CompanyId)
                            .to(Companies::Table, Companies::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-employee_id")
                            .from(Expenses::Table, Expenses::EmployeeId)
                            .to(Users::Table, Users::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-category_id")
                            .from(Expenses::Table, Expenses::CategoryId)
                            .to(Categories::Table, Categories::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-company_id-status")
                    .table(Expenses::Table)
                    .col(Expenses::CompanyId)
                    .col(Expenses::Status)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Approval actions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ApprovalActions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ApprovalActions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ApprovalActions::ExpenseId).uuid().not_null())
                    .col(
                        ColumnDef::new(ApprovalActions::ApproverId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ApprovalActions::StepOrder)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ApprovalActions::Decision).string().not_null())
                    .col(ColumnDef::new(ApprovalActions::Comment).string())
                    .col(
                        ColumnDef::new(ApprovalActions::DecidedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_actions-expense_id")
                            .from(ApprovalActions::Table, ApprovalActions::ExpenseId)
                            .to(Expenses::Table, Expenses::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-approval_actions-approver_id")
                            .from(ApprovalActions::Table, ApprovalActions::ApproverId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One decision per (expense, approver): the database backs the
        // engine's duplicate check.
        manager
            .create_index(
                Index::create()
                    .name("idx-approval_actions-expense_id-approver_id-unique")
                    .table(ApprovalActions::Table)
                    .col(ApprovalActions::ExpenseId)
                    .col(ApprovalActions::ApproverId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Audit logs
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AuditLogs::EntityType).string().not_null())
                    .col(ColumnDef::new(AuditLogs::EntityId).uuid().not_null())
                    .col(ColumnDef::new(AuditLogs::Action).string().not_null())
                    .col(ColumnDef::new(AuditLogs::UserId).uuid())
                    .col(ColumnDef::new(AuditLogs::DetailsJson).string().not_null())
                    .col(ColumnDef::new(AuditLogs::Timestamp).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-audit_logs-entity_type-entity_id")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::EntityType)
                    .col(AuditLogs::EntityId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalActions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RuleCategories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RuleApprovers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApprovalRules::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Companies::Table).to_owned())
            .await?;
        Ok(())
    }
}
