//! The approval workflow state machine.
//!
//! Everything here is pure: given the resolved rule, the employee's direct
//! manager, the expense's current step and the full decision history, a new
//! decision maps to a [`Verdict`]. Persistence, locking and notification
//! live in `ops::decisions`; this module never touches the database.
//!
//! Precedence of the evaluation, highest first:
//! 1. manager-first gate (only before any other action),
//! 2. rejection by a required approver,
//! 3. approval by an override approver,
//! 4. minimum-percentage threshold,
//! 5. sequence/parallel progression.
//!
//! `Approved` and `Rejected` are absorbing; the caller refuses decisions on
//! closed expenses before ever calling in here.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    ApprovalRule, Decision, EngineError, ResultEngine, Role, User, actions::GATE_STEP_ORDER,
};

/// Outcome of evaluating one decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected,
    /// Still open: the (possibly advanced) step and the approvers now
    /// awaited.
    Pending { step: i32, awaiting: Vec<Uuid> },
}

impl Verdict {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Verdict::Approved | Verdict::Rejected)
    }
}

/// A [`Verdict`] plus the step order to record on the new action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Position recorded on the action: the actor's sequence slot, the
    /// current step for override-only approvers, [`GATE_STEP_ORDER`] for
    /// the manager-first gate.
    pub step_order: i32,
}

/// Decision history entry as the evaluator sees it.
#[derive(Clone, Copy, Debug)]
struct Act {
    approver: Uuid,
    step_order: i32,
    decision: Decision,
}

/// Evaluates a new decision against a rule.
///
/// `history` holds every action already recorded for the expense, in
/// insertion order, *excluding* the incoming one. Duplicate and
/// closed-expense checks are the caller's job.
pub fn evaluate(
    rule: &ApprovalRule,
    manager_id: Option<Uuid>,
    current_step: i32,
    history: &[crate::ApprovalAction],
    actor: Uuid,
    decision: Decision,
) -> ResultEngine<Evaluation> {
    let seq = rule.sequence();
    let prior: Vec<Act> = history
        .iter()
        .map(|a| Act {
            approver: a.approver_id,
            step_order: a.step_order,
            decision: a.decision,
        })
        .collect();

    // No manager on record means there is no gate to wait for.
    let gate_pending = rule.is_manager_first && prior.is_empty() && manager_id.is_some();

    if gate_pending && manager_id == Some(actor) {
        // The manager's gate decision stands alone: a rejection is final, an
        // approval opens the sequence without satisfying any slot.
        let verdict = match decision {
            Decision::Rejected => Verdict::Rejected,
            Decision::Approved => {
                let all = [Act {
                    approver: actor,
                    step_order: GATE_STEP_ORDER,
                    decision,
                }];
                progress(rule, &seq, &all, Decision::Approved)
            }
        };
        return Ok(Evaluation {
            verdict,
            step_order: GATE_STEP_ORDER,
        });
    }

    // Required rejections and override approvals act at any time; every
    // other decision must come from the active set, and nothing but those
    // two can jump a pending manager gate.
    let spec = rule.approver(actor);
    let required_rejection = decision == Decision::Rejected && spec.is_some_and(|a| a.required);
    let override_approval = decision == Decision::Approved && spec.is_some_and(|a| a.can_override);

    let in_turn = if rule.sequential {
        seq.get(usize::try_from(current_step).unwrap_or(usize::MAX)) == Some(&actor)
    } else {
        seq.contains(&actor)
    };
    if !required_rejection && !override_approval && (gate_pending || !in_turn) {
        let message = if gate_pending {
            "waiting for the manager's decision"
        } else {
            "user is not an active approver of this expense"
        };
        return Err(EngineError::NotAnApprover(message.to_string()));
    }

    let step_order = match rule.approver(actor).and_then(|a| a.position) {
        Some(position) => i32::try_from(position)
            .map_err(|_| EngineError::InvalidRule("approver position overflow".to_string()))?,
        None => current_step.max(0),
    };

    let mut all = prior;
    all.push(Act {
        approver: actor,
        step_order,
        decision,
    });

    // Required-approver rejection beats everything else.
    if required_rejection {
        return Ok(Evaluation {
            verdict: Verdict::Rejected,
            step_order,
        });
    }

    // Override approval short-circuits the remaining approvers.
    if override_approval {
        return Ok(Evaluation {
            verdict: Verdict::Approved,
            step_order,
        });
    }

    if let Some(verdict) = percentage_verdict(rule, &seq, &all) {
        return Ok(Evaluation {
            verdict,
            step_order,
        });
    }

    Ok(Evaluation {
        verdict: progress(rule, &seq, &all, decision),
        step_order,
    })
}

/// Minimum-percentage check. Only sequence members' in-sequence decisions
/// count; the manager-first gate approval satisfies nothing.
///
/// The comparison `approved / len >= threshold / 100` is done as
/// `approved * 100 >= threshold * len` so an exact threshold (2 of 3
/// vs. 66%) is never lost to rounding.
fn percentage_verdict(rule: &ApprovalRule, seq: &[Uuid], all: &[Act]) -> Option<Verdict> {
    let threshold = rule.minimum_percent_approval?;
    if seq.is_empty() {
        return None;
    }
    let approved = all
        .iter()
        .filter(|a| {
            a.step_order >= 0 && a.decision == Decision::Approved && seq.contains(&a.approver)
        })
        .count();
    (approved * 100 >= usize::from(threshold) * seq.len()).then_some(Verdict::Approved)
}

/// Advances the workflow once no terminal condition has fired.
///
/// Slots whose approver has already decided (via the gate or out of turn)
/// are skipped, so the current step only ever moves forward.
fn progress(rule: &ApprovalRule, seq: &[Uuid], all: &[Act], last_decision: Decision) -> Verdict {
    let decided: HashSet<Uuid> = all.iter().map(|a| a.approver).collect();

    if rule.sequential {
        match seq.iter().position(|u| !decided.contains(u)) {
            Some(slot) => Verdict::Pending {
                step: slot as i32,
                awaiting: vec![seq[slot]],
            },
            // Sequence exhausted: the closing decision settles the outcome.
            None => match last_decision {
                Decision::Approved => Verdict::Approved,
                Decision::Rejected => Verdict::Rejected,
            },
        }
    } else {
        let awaiting: Vec<Uuid> = seq
            .iter()
            .filter(|u| !decided.contains(u))
            .copied()
            .collect();
        if awaiting.is_empty() {
            let any_rejection = all.iter().any(|a| {
                a.step_order >= 0 && a.decision == Decision::Rejected && seq.contains(&a.approver)
            });
            if any_rejection {
                Verdict::Rejected
            } else {
                Verdict::Approved
            }
        } else {
            Verdict::Pending { step: 0, awaiting }
        }
    }
}

/// Fallback policy when no rule matches the expense category: the first
/// sign-off by the employee's direct manager (or by a company admin when
/// the employee has no manager) settles the expense outright.
pub fn evaluate_fallback(
    employee: &User,
    actor: &User,
    decision: Decision,
) -> ResultEngine<Evaluation> {
    let entitled = match employee.manager_id {
        Some(manager_id) => actor.id == manager_id,
        None => actor.role == Role::Admin && actor.company_id == employee.company_id,
    };
    if !entitled {
        return Err(EngineError::NotAnApprover(
            "only the employee's manager may decide on this expense".to_string(),
        ));
    }
    let verdict = match decision {
        Decision::Approved => Verdict::Approved,
        Decision::Rejected => Verdict::Rejected,
    };
    Ok(Evaluation {
        verdict,
        step_order: 0,
    })
}

/// Approvers a pending expense is currently waiting on.
///
/// Mirrors the active set of [`evaluate`]: the manager while the gate is
/// pending, the current slot for sequential rules, every undecided member
/// for parallel rules, plus undecided override approvers.
pub fn awaiting(
    rule: &ApprovalRule,
    manager_id: Option<Uuid>,
    current_step: i32,
    history: &[crate::ApprovalAction],
) -> Vec<Uuid> {
    let decided: HashSet<Uuid> = history.iter().map(|a| a.approver_id).collect();
    let seq = rule.sequence();

    let mut awaiting: Vec<Uuid> = if rule.is_manager_first && history.is_empty() && manager_id.is_some() {
        manager_id.into_iter().collect()
    } else if rule.sequential {
        seq.get(usize::try_from(current_step).unwrap_or(usize::MAX))
            .filter(|u| !decided.contains(u))
            .copied()
            .into_iter()
            .collect()
    } else {
        seq.iter().filter(|u| !decided.contains(u)).copied().collect()
    };

    for approver in &rule.approvers {
        if approver.can_override
            && !decided.contains(&approver.user_id)
            && !awaiting.contains(&approver.user_id)
        {
            awaiting.push(approver.user_id);
        }
    }
    awaiting
}

/// Approvers to notify right after submission: the manager when the rule is
/// manager-first, otherwise the initial active set, plus any override
/// approvers (who may act at any time).
pub fn initial_awaiting(rule: &ApprovalRule, manager_id: Option<Uuid>) -> Vec<Uuid> {
    let seq = rule.sequence();
    let mut awaiting: Vec<Uuid> = if rule.is_manager_first && manager_id.is_some() {
        manager_id.into_iter().collect()
    } else if rule.sequential {
        seq.first().copied().into_iter().collect()
    } else {
        seq
    };
    for approver in &rule.approvers {
        if approver.can_override && !awaiting.contains(&approver.user_id) {
            awaiting.push(approver.user_id);
        }
    }
    awaiting
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ApprovalAction, RuleApprover, UserStatus};
    use chrono::Utc;

    fn rule_with(approvers: Vec<RuleApprover>, sequential: bool) -> ApprovalRule {
        ApprovalRule {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            name: "Travel".to_string(),
            description: None,
            sequential,
            is_manager_first: false,
            minimum_percent_approval: None,
            category_ids: vec![],
            approvers,
            created_at: Utc::now(),
        }
    }

    fn slot(user: Uuid, position: u32) -> RuleApprover {
        RuleApprover {
            user_id: user,
            position: Some(position),
            required: false,
            can_override: false,
        }
    }

    fn required_slot(user: Uuid, position: u32) -> RuleApprover {
        RuleApprover {
            required: true,
            ..slot(user, position)
        }
    }

    fn action(approver: Uuid, step_order: i32, decision: Decision) -> ApprovalAction {
        ApprovalAction {
            id: Uuid::new_v4(),
            expense_id: Uuid::new_v4(),
            approver_id: approver,
            step_order,
            decision,
            comment: None,
            decided_at: Utc::now(),
        }
    }

    fn user(id: Uuid, company_id: Uuid, role: Role, manager_id: Option<Uuid>) -> User {
        User {
            id,
            company_id,
            name: "u".to_string(),
            email: format!("{id}@example.com"),
            role,
            manager_id,
            status: UserStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sequential_approvals_walk_the_sequence() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1), slot(c, 2)], true);

        let eval = evaluate(&rule, None, 0, &[], a, Decision::Approved).unwrap();
        assert_eq!(
            eval.verdict,
            Verdict::Pending {
                step: 1,
                awaiting: vec![b]
            }
        );
        assert_eq!(eval.step_order, 0);

        let history = vec![action(a, 0, Decision::Approved)];
        let eval = evaluate(&rule, None, 1, &history, b, Decision::Approved).unwrap();
        assert_eq!(
            eval.verdict,
            Verdict::Pending {
                step: 2,
                awaiting: vec![c]
            }
        );

        let history = vec![
            action(a, 0, Decision::Approved),
            action(b, 1, Decision::Approved),
        ];
        let eval = evaluate(&rule, None, 2, &history, c, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Approved);
    }

    #[test]
    fn sequential_refuses_out_of_turn_decisions() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1)], true);

        let err = evaluate(&rule, None, 0, &[], b, Decision::Approved).unwrap_err();
        assert!(matches!(err, EngineError::NotAnApprover(_)));
    }

    #[test]
    fn required_rejection_rejects_despite_pending_approvers() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), required_slot(b, 1), slot(c, 2)], true);

        let history = vec![action(a, 0, Decision::Approved)];
        let eval = evaluate(&rule, None, 1, &history, b, Decision::Rejected).unwrap();
        assert_eq!(eval.verdict, Verdict::Rejected);
    }

    #[test]
    fn non_required_rejection_is_an_abstention() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1)], true);

        let eval = evaluate(&rule, None, 0, &[], a, Decision::Rejected).unwrap();
        assert_eq!(
            eval.verdict,
            Verdict::Pending {
                step: 1,
                awaiting: vec![b]
            }
        );
    }

    #[test]
    fn rejection_by_last_sequence_member_rejects() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1)], true);

        let history = vec![action(a, 0, Decision::Approved)];
        let eval = evaluate(&rule, None, 1, &history, b, Decision::Rejected).unwrap();
        assert_eq!(eval.verdict, Verdict::Rejected);
    }

    #[test]
    fn override_approval_short_circuits_at_any_step() {
        let (a, b, boss) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(
            vec![
                required_slot(a, 0),
                slot(b, 1),
                RuleApprover {
                    user_id: boss,
                    position: None,
                    required: false,
                    can_override: true,
                },
            ],
            true,
        );

        // Even though the required approver at slot 0 never decided.
        let eval = evaluate(&rule, None, 0, &[], boss, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Approved);
        assert_eq!(eval.step_order, 0);
    }

    #[test]
    fn override_only_rejection_is_refused() {
        // An override approver's power is the approval shortcut; their
        // rejection is not part of any active set and is refused.
        let (a, boss) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(
            vec![
                slot(a, 0),
                RuleApprover {
                    user_id: boss,
                    position: None,
                    required: false,
                    can_override: true,
                },
            ],
            true,
        );

        let err = evaluate(&rule, None, 0, &[], boss, Decision::Rejected).unwrap_err();
        assert!(matches!(err, EngineError::NotAnApprover(_)));
    }

    #[test]
    fn required_rejection_acts_out_of_turn() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), required_slot(b, 1)], true);

        // Slot 1 is not active yet; the required rejection still lands.
        let eval = evaluate(&rule, None, 0, &[], b, Decision::Rejected).unwrap();
        assert_eq!(eval.verdict, Verdict::Rejected);
    }

    #[test]
    fn percentage_threshold_fires_without_waiting_for_everyone() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut rule = rule_with(vec![slot(a, 0), slot(b, 1), slot(c, 2)], false);
        rule.minimum_percent_approval = Some(60);

        let history = vec![action(a, 0, Decision::Approved)];
        // 2 of 3 = 66.66..% >= 60%: approved on the second decision.
        let eval = evaluate(&rule, None, 0, &history, b, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Approved);
    }

    #[test]
    fn exact_two_thirds_meets_a_66_percent_threshold() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut rule = rule_with(vec![slot(a, 0), slot(b, 1), slot(c, 2)], false);
        rule.minimum_percent_approval = Some(66);

        let history = vec![action(a, 0, Decision::Approved)];
        let eval = evaluate(&rule, None, 0, &history, b, Decision::Approved).unwrap();
        // 2 * 100 >= 66 * 3 — integer math, no float rounding below the bar.
        assert_eq!(eval.verdict, Verdict::Approved);
    }

    #[test]
    fn parallel_rejection_waits_for_all_then_rejects() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1)], false);

        let eval = evaluate(&rule, None, 0, &[], a, Decision::Rejected).unwrap();
        assert_eq!(
            eval.verdict,
            Verdict::Pending {
                step: 0,
                awaiting: vec![b]
            }
        );

        let history = vec![action(a, 0, Decision::Rejected)];
        let eval = evaluate(&rule, None, 0, &history, b, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Rejected);
    }

    #[test]
    fn parallel_all_approvals_approve() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1)], false);

        let history = vec![action(a, 0, Decision::Approved)];
        let eval = evaluate(&rule, None, 0, &history, b, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Approved);
    }

    #[test]
    fn manager_first_rejection_is_terminal() {
        let (m, a) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rule = rule_with(vec![slot(a, 0)], true);
        rule.is_manager_first = true;

        let eval = evaluate(&rule, Some(m), 0, &[], m, Decision::Rejected).unwrap();
        assert_eq!(eval.verdict, Verdict::Rejected);
        assert_eq!(eval.step_order, GATE_STEP_ORDER);
    }

    #[test]
    fn manager_first_approval_opens_the_sequence() {
        let (m, a) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rule = rule_with(vec![slot(a, 0)], true);
        rule.is_manager_first = true;

        let eval = evaluate(&rule, Some(m), 0, &[], m, Decision::Approved).unwrap();
        assert_eq!(
            eval.verdict,
            Verdict::Pending {
                step: 0,
                awaiting: vec![a]
            }
        );
    }

    #[test]
    fn manager_first_approval_with_empty_sequence_approves() {
        let m = Uuid::new_v4();
        let mut rule = rule_with(vec![], true);
        rule.is_manager_first = true;

        let eval = evaluate(&rule, Some(m), 0, &[], m, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Approved);
    }

    #[test]
    fn manager_gate_approval_satisfies_no_sequence_slot() {
        // The manager also sits at slot 0; the gate approval skips the slot
        // without counting toward the percentage threshold.
        let (m, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rule = rule_with(vec![slot(m, 0), slot(b, 1)], true);
        rule.is_manager_first = true;
        rule.minimum_percent_approval = Some(50);

        let eval = evaluate(&rule, Some(m), 0, &[], m, Decision::Approved).unwrap();
        // Not approved at 50%: the gate decision is not a sequence approval.
        assert_eq!(
            eval.verdict,
            Verdict::Pending {
                step: 1,
                awaiting: vec![b]
            }
        );
    }

    #[test]
    fn sequence_members_cannot_act_before_the_manager_gate() {
        let (m, a) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rule = rule_with(vec![slot(a, 0)], true);
        rule.is_manager_first = true;

        let err = evaluate(&rule, Some(m), 0, &[], a, Decision::Approved).unwrap_err();
        assert!(matches!(err, EngineError::NotAnApprover(_)));
    }

    #[test]
    fn stranger_is_not_an_approver() {
        let (a, nobody) = (Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0)], true);

        let err = evaluate(&rule, None, 0, &[], nobody, Decision::Approved).unwrap_err();
        assert!(matches!(err, EngineError::NotAnApprover(_)));
    }

    #[test]
    fn step_never_decreases() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rule = rule_with(vec![slot(a, 0), slot(b, 1), slot(c, 2)], true);

        let mut step = 0;
        let mut history = Vec::new();
        for (actor, decision) in [
            (a, Decision::Rejected),
            (b, Decision::Approved),
            (c, Decision::Approved),
        ] {
            let eval = evaluate(&rule, None, step, &history, actor, decision).unwrap();
            history.push(action(actor, eval.step_order, decision));
            if let Verdict::Pending { step: next, .. } = eval.verdict {
                assert!(next >= step);
                step = next;
            }
        }
    }

    #[test]
    fn fallback_manager_decision_is_terminal() {
        let company = Uuid::new_v4();
        let manager = user(Uuid::new_v4(), company, Role::Manager, None);
        let employee = user(Uuid::new_v4(), company, Role::Employee, Some(manager.id));

        let eval = evaluate_fallback(&employee, &manager, Decision::Approved).unwrap();
        assert_eq!(eval.verdict, Verdict::Approved);
        let eval = evaluate_fallback(&employee, &manager, Decision::Rejected).unwrap();
        assert_eq!(eval.verdict, Verdict::Rejected);
    }

    #[test]
    fn fallback_without_manager_falls_to_company_admin() {
        let company = Uuid::new_v4();
        let admin = user(Uuid::new_v4(), company, Role::Admin, None);
        let outsider = user(Uuid::new_v4(), Uuid::new_v4(), Role::Admin, None);
        let employee = user(Uuid::new_v4(), company, Role::Employee, None);

        assert!(evaluate_fallback(&employee, &admin, Decision::Approved).is_ok());
        assert!(matches!(
            evaluate_fallback(&employee, &outsider, Decision::Approved),
            Err(EngineError::NotAnApprover(_))
        ));
    }

    #[test]
    fn initial_awaiting_matches_the_rule_shape() {
        let (m, a, b, boss) = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        let overrider = RuleApprover {
            user_id: boss,
            position: None,
            required: false,
            can_override: true,
        };

        let mut rule = rule_with(vec![slot(a, 0), slot(b, 1), overrider], true);
        assert_eq!(initial_awaiting(&rule, Some(m)), vec![a, boss]);

        rule.is_manager_first = true;
        assert_eq!(initial_awaiting(&rule, Some(m)), vec![m, boss]);

        let rule = rule_with(vec![slot(a, 0), slot(b, 1), overrider], false);
        assert_eq!(initial_awaiting(&rule, None), vec![a, b, boss]);
    }
}
