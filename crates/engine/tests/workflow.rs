use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::Database;
use uuid::Uuid;

use engine::{
    ApproverSpec, CreateCategoryCmd, CreateCompanyCmd, CreateRuleCmd, CreateUserCmd, Currency,
    DecideCmd, Decision, Engine, EngineError, ExpenseStatus, Role, SubmitExpenseCmd,
};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

struct Fixture {
    company_id: Uuid,
    category_id: Uuid,
    manager: Uuid,
    employee: Uuid,
}

/// Company with one manager and one employee reporting to them, plus a
/// "Travel" category.
async fn fixture(engine: &Engine) -> Fixture {
    let company = engine
        .create_company(CreateCompanyCmd::new("Acme", "IT", Currency::Eur))
        .await
        .unwrap();
    let manager = engine
        .create_user(CreateUserCmd::new(
            company.id,
            "Marta",
            "marta@acme.test",
            "pw",
            Role::Manager,
        ))
        .await
        .unwrap();
    let employee = engine
        .create_user(
            CreateUserCmd::new(
                company.id,
                "Elio",
                "elio@acme.test",
                "pw",
                Role::Employee,
            )
            .manager(manager.id),
        )
        .await
        .unwrap();
    let category = engine
        .create_category(CreateCategoryCmd::new(company.id, "Travel"))
        .await
        .unwrap();

    Fixture {
        company_id: company.id,
        category_id: category.id,
        manager: manager.id,
        employee: employee.id,
    }
}

async fn approver(engine: &Engine, company_id: Uuid, tag: &str) -> Uuid {
    engine
        .create_user(CreateUserCmd::new(
            company_id,
            tag,
            format!("{tag}@acme.test"),
            "pw",
            Role::Manager,
        ))
        .await
        .unwrap()
        .id
}

async fn submit(engine: &Engine, fx: &Fixture) -> Uuid {
    engine
        .submit_expense(SubmitExpenseCmd::new(
            fx.employee,
            fx.category_id,
            "taxi to the airport",
            4_200,
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap()
        .id
}

fn decide(expense: Uuid, approver: Uuid, decision: Decision) -> DecideCmd {
    DecideCmd::new(expense, approver, decision, Utc::now())
}

#[tokio::test]
async fn sequential_rule_walks_steps_to_approval() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Travel chain")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::at(a2, 1)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;
    let expense = engine.expense(expense_id).await.unwrap();
    assert_eq!(expense.status, ExpenseStatus::Pending);
    assert_eq!(expense.current_step, 0);

    let outcome = engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Pending);
    assert_eq!(outcome.current_step, 1);

    let outcome = engine
        .decide(decide(expense_id, a2, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Approved);

    let actions = engine.list_actions(expense_id).await.unwrap();
    assert_eq!(actions.len(), 2);
    assert!(actions.windows(2).all(|w| w[0].step_order <= w[1].step_order));
}

#[tokio::test]
async fn second_decision_by_same_approver_is_a_conflict() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Travel chain")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::at(a2, 1)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;
    engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap();

    let err = engine
        .decide(decide(expense_id, a1, Decision::Rejected))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateDecision(_)));

    // No state change from the refused replay.
    let expense = engine.expense(expense_id).await.unwrap();
    assert_eq!(expense.status, ExpenseStatus::Pending);
    assert_eq!(expense.current_step, 1);
    assert_eq!(engine.list_actions(expense_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn terminal_expense_refuses_further_decisions() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Single approver")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::override_only(a2)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;
    engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap();

    let err = engine
        .decide(decide(expense_id, a2, Decision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExpenseClosed(_)));
}

#[tokio::test]
async fn required_approver_rejection_rejects_despite_pending_third() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2, a3) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
        approver(&engine, fx.company_id, "a3").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Strict middle")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::at(a2, 1).required())
                .approver(ApproverSpec::at(a3, 2)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;
    engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap();
    let outcome = engine
        .decide(decide(expense_id, a2, Decision::Rejected))
        .await
        .unwrap();

    // a3 never decided, the rejection still closes the expense.
    assert_eq!(outcome.status, ExpenseStatus::Rejected);
}

#[tokio::test]
async fn percentage_threshold_approves_without_the_third_vote() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2, a3) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
        approver(&engine, fx.company_id, "a3").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Majority wins")
                .category(fx.category_id)
                .parallel()
                .minimum_percent(60)
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::at(a2, 1))
                .approver(ApproverSpec::at(a3, 2)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;
    let outcome = engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Pending);

    // 2 of 3 = 66.7% >= 60%: approved as soon as the second vote lands.
    let outcome = engine
        .decide(decide(expense_id, a2, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn manager_first_rejection_closes_before_the_sequence_starts() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let a1 = approver(&engine, fx.company_id, "a1").await;

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Manager gate")
                .category(fx.category_id)
                .manager_first()
                .approver(ApproverSpec::at(a1, 0)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;

    // The sequence approver cannot jump the gate.
    let err = engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAnApprover(_)));

    let outcome = engine
        .decide(decide(expense_id, fx.manager, Decision::Rejected))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Rejected);

    let err = engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExpenseClosed(_)));
}

#[tokio::test]
async fn override_approver_beats_undecided_required_one() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, boss) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "boss").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "CFO shortcut")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0).required())
                .approver(ApproverSpec::override_only(boss)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;
    let outcome = engine
        .decide(decide(expense_id, boss, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn fallback_without_rule_lets_the_manager_settle() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    // No rule created for the category at all.

    let expense_id = submit(&engine, &fx).await;

    let stranger = approver(&engine, fx.company_id, "stranger").await;
    let err = engine
        .decide(decide(expense_id, stranger, Decision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAnApprover(_)));

    let outcome = engine
        .decide(decide(expense_id, fx.manager, Decision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn most_recent_matching_rule_wins() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Old policy")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "New policy")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a2, 0)),
        )
        .await
        .unwrap();

    let resolved = engine
        .applicable_rule(fx.company_id, fx.category_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id, newer.id);

    let reloaded = engine.rule(newer.id).await.unwrap();
    assert_eq!(reloaded.name, "New policy");
    assert_eq!(reloaded.sequence(), vec![a2]);

    // The old rule's approver has no say anymore.
    let expense_id = submit(&engine, &fx).await;
    let err = engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAnApprover(_)));
}

#[tokio::test]
async fn malformed_rule_is_refused_at_creation() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;

    let err = engine
        .create_rule(CreateRuleCmd::new(fx.company_id, "Empty").category(fx.category_id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));

    let a1 = approver(&engine, fx.company_id, "a1").await;
    let err = engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Gap")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));

    let err = engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Percent")
                .category(fx.category_id)
                .minimum_percent(150)
                .approver(ApproverSpec::at(a1, 0)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRule(_)));
}

#[tokio::test]
async fn manager_cycles_are_refused_at_assignment() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;

    // employee -> manager already holds; closing the loop must fail.
    let err = engine
        .assign_manager(fx.manager, Some(fx.employee), fx.manager)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ManagerCycle(_)));

    let err = engine
        .assign_manager(fx.employee, Some(fx.employee), fx.manager)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ManagerCycle(_)));
}

#[tokio::test]
async fn submission_converts_into_the_company_base_currency() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;

    let expense = engine
        .submit_expense(SubmitExpenseCmd::new(
            fx.employee,
            fx.category_id,
            "conference ticket",
            10_000,
            Currency::Usd,
            Utc::now(),
        ))
        .await
        .unwrap();

    assert_eq!(expense.currency_original, Currency::Usd);
    // 100.00 USD -> EUR at the fixed table (1 EUR = 1.0843 USD).
    assert_eq!(expense.amount_converted_minor, 9_223);
    assert_eq!(expense.amount_original_minor, 10_000);
}

#[tokio::test]
async fn pending_approvals_tracks_the_active_set() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;
    let (a1, a2) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Travel chain")
                .category(fx.category_id)
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::at(a2, 1)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;

    let pending_a1 = engine.pending_approvals(a1).await.unwrap();
    assert!(pending_a1.iter().any(|e| e.id == expense_id));
    // Not a2's turn yet under the sequential rule.
    let pending_a2 = engine.pending_approvals(a2).await.unwrap();
    assert!(pending_a2.iter().all(|e| e.id != expense_id));

    engine
        .decide(decide(expense_id, a1, Decision::Approved))
        .await
        .unwrap();

    let pending_a2 = engine.pending_approvals(a2).await.unwrap();
    assert!(pending_a2.iter().any(|e| e.id == expense_id));
}

#[tokio::test]
async fn concurrent_decisions_on_one_expense_serialize() {
    let engine = Arc::new(engine_with_db().await);
    let fx = fixture(&engine).await;
    let (a1, a2) = (
        approver(&engine, fx.company_id, "a1").await,
        approver(&engine, fx.company_id, "a2").await,
    );

    engine
        .create_rule(
            CreateRuleCmd::new(fx.company_id, "Both must vote")
                .category(fx.category_id)
                .parallel()
                .approver(ApproverSpec::at(a1, 0))
                .approver(ApproverSpec::at(a2, 1)),
        )
        .await
        .unwrap();

    let expense_id = submit(&engine, &fx).await;

    let (left, right) = tokio::join!(
        {
            let engine = Arc::clone(&engine);
            async move {
                engine
                    .decide(decide(expense_id, a1, Decision::Approved))
                    .await
            }
        },
        {
            let engine = Arc::clone(&engine);
            async move {
                engine
                    .decide(decide(expense_id, a2, Decision::Approved))
                    .await
            }
        },
    );
    left.unwrap();
    right.unwrap();

    let expense = engine.expense(expense_id).await.unwrap();
    assert_eq!(expense.status, ExpenseStatus::Approved);
    assert_eq!(engine.list_actions(expense_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn audit_trail_records_submission_and_decisions() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;

    let expense_id = submit(&engine, &fx).await;
    engine
        .decide(decide(expense_id, fx.manager, Decision::Approved))
        .await
        .unwrap();

    let trail = engine.list_audit("expense", expense_id).await.unwrap();
    let actions: Vec<&str> = trail.iter().map(|e| e.action.as_str()).collect();
    assert!(actions.contains(&"submitted"));
    assert!(actions.contains(&"decision_recorded"));

    // The login lookup sees the same user the fixture created.
    let manager = engine.user_by_email("marta@acme.test").await.unwrap();
    assert_eq!(manager.id, fx.manager);
}

#[tokio::test]
async fn expense_listing_paginates_with_cursors() {
    let engine = engine_with_db().await;
    let fx = fixture(&engine).await;

    for _ in 0..5 {
        submit(&engine, &fx).await;
    }

    let first = engine
        .list_expenses(fx.company_id, Default::default(), 2, None)
        .await
        .unwrap();
    assert_eq!(first.expenses.len(), 2);
    let cursor = first.next_cursor.expect("more pages expected");

    let second = engine
        .list_expenses(fx.company_id, Default::default(), 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(second.expenses.len(), 2);
    assert!(
        first
            .expenses
            .iter()
            .all(|e| second.expenses.iter().all(|f| f.id != e.id))
    );
}
