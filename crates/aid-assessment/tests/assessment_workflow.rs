//! End-to-end runs of the assessment state machine over the in-memory adapters.
//!
//! Each scenario drives the orchestrator the way the messaging layer would: start a run,
//! deliver correlated messages, and inspect what the gateway recorded.

mod common {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use aid_assessment::calculator::{AssessmentCalculator, ConsolidatedAssessmentInput};
    use aid_assessment::workflow::{
        ApplicationId, ApplicationStatus, AssessmentId, AssessmentOrchestrator, AssessmentRecord,
        AssessmentTrigger, FixedClock, InMemoryAdapters, ProcessEntry,
    };

    pub(super) fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 8, 15).expect("valid date")
    }

    /// Single independent full-time student on a 16-week offering.
    pub(super) fn input_json() -> Value {
        json!({
            "programYear": "2023-2024",
            "student": {},
            "offering": {
                "startDate": "2023-09-05",
                "endDate": "2023-12-22",
                "weeks": 16,
                "tuition": "3500",
                "booksAndSupplies": "1500"
            }
        })
    }

    pub(super) fn dependant_with_parents(able: [bool; 2]) -> Value {
        let mut value = input_json();
        value["student"]["dependencyStatus"] = json!("dependant");
        value["parents"] = json!([
            { "ableToReport": able[0], "totalIncome": "90000", "dependants": 1 },
            { "ableToReport": able[1], "totalIncome": "60000" }
        ]);
        value
    }

    pub(super) fn input(value: Value) -> ConsolidatedAssessmentInput {
        serde_json::from_value(value).expect("consolidated input parses")
    }

    pub(super) struct Harness {
        pub adapters: InMemoryAdapters,
        pub orchestrator: AssessmentOrchestrator,
    }

    impl Harness {
        pub(super) fn new() -> Self {
            let adapters = InMemoryAdapters::default();
            let orchestrator = Self::orchestrator_for(&adapters);
            Self {
                adapters,
                orchestrator,
            }
        }

        /// A fresh orchestrator over the same stores, as after a process restart.
        pub(super) fn orchestrator_for(adapters: &InMemoryAdapters) -> AssessmentOrchestrator {
            AssessmentOrchestrator::new(
                adapters.ports(Arc::new(FixedClock(today()))),
                AssessmentCalculator::default(),
            )
        }

        pub(super) fn seed(
            &self,
            assessment_id: u64,
            application_id: u64,
            status: ApplicationStatus,
            noa_approved: bool,
            value: Value,
        ) {
            self.adapters.gateway.insert_assessment(
                AssessmentRecord {
                    assessment_id: AssessmentId(assessment_id),
                    application_id: ApplicationId(application_id),
                    application_status: status,
                    noa_approved,
                },
                input(value),
            );
        }
    }

    pub(super) fn entry(assessment_id: u64, trigger: AssessmentTrigger) -> ProcessEntry {
        ProcessEntry {
            assessment_id: AssessmentId(assessment_id),
            trigger,
            application_status: None,
            application_edit_status: None,
        }
    }
}

use aid_assessment::workflow::{
    ApplicationEditStatus, ApplicationId, ApplicationStatus, AssessmentId, AssessmentStep,
    AssessmentTrigger, ChangeRequestDecision, CorrelatedMessage, Delivery, MessageName, NoaStatus,
    PartyRole, RunReport, RunStatus, WorkflowError,
};
use common::{dependant_with_parents, entry, input_json, Harness};

fn income_verified(harness: &Harness, role: PartyRole) -> CorrelatedMessage {
    let id = harness
        .adapters
        .verifications
        .id_for(role)
        .expect("verification dispatched for role");
    CorrelatedMessage::new(MessageName::IncomeVerified, id.0)
}

fn supporting_info(harness: &Harness, role: PartyRole) -> CorrelatedMessage {
    let id = harness
        .adapters
        .supporting_users
        .id_for(role)
        .expect("supporting user created for role");
    CorrelatedMessage::new(MessageName::SupportingUserInfoReceived, id.0)
}

fn advanced(delivery: Delivery) -> RunReport {
    match delivery {
        Delivery::Advanced(report) => report,
        other => panic!("expected the run to advance, got {other:?}"),
    }
}

#[test]
fn independent_student_completes_after_income_verification() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::InProgress, false, input_json());

    let report = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    assert_eq!(report.status, RunStatus::Suspended);
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
    assert_eq!(report.waiting_on.len(), 1);
    assert_eq!(harness.adapters.verifications.dispatched().len(), 1);
    assert!(harness.adapters.supporting_users.created().is_empty());

    let report = advanced(
        harness
            .orchestrator
            .deliver(income_verified(&harness, PartyRole::Student))
            .expect("delivery succeeds"),
    );
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(
        report.milestones,
        vec![
            AssessmentStep::AssociateInstance,
            AssessmentStep::LoadData,
            AssessmentStep::VerifyExceptions,
            AssessmentStep::ProgramInfoNotRequired,
            AssessmentStep::IdentifySupportingUsers,
            AssessmentStep::IncomeVerificationJoin,
            AssessmentStep::VerifyCalculationOrder,
            AssessmentStep::Calculate,
            AssessmentStep::SaveDisbursements,
            AssessmentStep::AssociateAgreement,
            AssessmentStep::UpdateNoaStatus,
            AssessmentStep::UpdateApplicationStatus,
            AssessmentStep::Done,
        ]
    );

    let gateway = &harness.adapters.gateway;
    let id = AssessmentId(1);
    assert!(gateway.instance_associated(id));
    assert_eq!(gateway.calculation_count(id), 1);
    assert!(gateway.agreement_associated(id));
    assert_eq!(gateway.noa_status(id), Some(NoaStatus::Required));
    assert_eq!(
        gateway.application_status(ApplicationId(100)),
        Some(ApplicationStatus::Assessment)
    );

    let disbursements = gateway.disbursements(id);
    assert_eq!(disbursements.len(), 1, "16 weeks pays out once");
    assert_eq!(
        disbursements[0].disbursement_date,
        chrono::NaiveDate::from_ymd_opt(2023, 9, 5).expect("valid date")
    );
    let output = gateway.saved_output(id).expect("output saved");
    assert!(output.total_award() > rust_decimal::Decimal::ZERO);
}

#[test]
fn duplicate_delivery_never_recalculates() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::InProgress, false, input_json());
    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");

    let message = income_verified(&harness, PartyRole::Student);
    advanced(harness.orchestrator.deliver(message).expect("first delivery"));
    let second = harness.orchestrator.deliver(message).expect("second delivery");

    assert_eq!(
        second,
        Delivery::Duplicate {
            assessment_id: AssessmentId(1)
        }
    );
    assert_eq!(harness.adapters.gateway.calculation_count(AssessmentId(1)), 1);

    let resumed = harness
        .orchestrator
        .resume(AssessmentId(1))
        .expect("resume of a finished run");
    assert_eq!(resumed.status, RunStatus::Completed);
    assert_eq!(harness.adapters.gateway.calculation_count(AssessmentId(1)), 1);
}

#[test]
fn starting_twice_is_rejected() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::InProgress, false, input_json());
    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");

    let err = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect_err("second start rejected");
    assert!(matches!(err, WorkflowError::AlreadyStarted(AssessmentId(1))));
}

#[test]
fn unknown_assessment_fails_at_association() {
    let harness = Harness::new();
    let err = harness
        .orchestrator
        .start(entry(9, AssessmentTrigger::OriginalAssessment))
        .expect_err("no record to associate");
    assert!(matches!(err, WorkflowError::Gateway(_)));
}

#[test]
fn unmatched_message_is_reported() {
    let harness = Harness::new();
    let delivery = harness
        .orchestrator
        .deliver(CorrelatedMessage::new(MessageName::IncomeVerified, 404))
        .expect("delivery succeeds");
    assert_eq!(delivery, Delivery::Unmatched);
}

#[test]
fn dependant_waits_for_both_parents_before_income_verification() {
    let harness = Harness::new();
    harness.seed(
        1,
        100,
        ApplicationStatus::InProgress,
        false,
        dependant_with_parents([true, true]),
    );

    let report = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    assert_eq!(report.step, AssessmentStep::IdentifySupportingUsers);
    assert_eq!(report.waiting_on.len(), 2);
    assert!(harness.adapters.verifications.dispatched().is_empty());

    let report = advanced(
        harness
            .orchestrator
            .deliver(supporting_info(&harness, PartyRole::Parent2))
            .expect("parent 2 delivery"),
    );
    assert_eq!(report.status, RunStatus::Suspended);
    assert_eq!(report.step, AssessmentStep::IdentifySupportingUsers);
    assert_eq!(harness.adapters.supporting_users.created().len(), 2);

    let report = advanced(
        harness
            .orchestrator
            .deliver(supporting_info(&harness, PartyRole::Parent1))
            .expect("parent 1 delivery"),
    );
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
    let roles: Vec<PartyRole> = harness
        .adapters
        .verifications
        .dispatched()
        .iter()
        .map(|request| request.role)
        .collect();
    assert_eq!(
        roles,
        vec![PartyRole::Student, PartyRole::Parent1, PartyRole::Parent2]
    );
}

#[test]
fn married_dependant_joins_four_income_branches_in_any_order() {
    let harness = Harness::new();
    let mut value = dependant_with_parents([true, true]);
    value["student"]["relationshipStatus"] = serde_json::json!("married");
    value["partner"] = serde_json::json!({ "income": "20000" });
    harness.seed(1, 100, ApplicationStatus::InProgress, false, value);

    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    for role in [PartyRole::Parent1, PartyRole::Parent2] {
        advanced(
            harness
                .orchestrator
                .deliver(supporting_info(&harness, role))
                .expect("supporting delivery"),
        );
    }
    assert_eq!(harness.adapters.verifications.dispatched().len(), 4);

    let order = [
        PartyRole::Parent2,
        PartyRole::Partner,
        PartyRole::Student,
        PartyRole::Parent1,
    ];
    let mut last = None;
    for (index, role) in order.into_iter().enumerate() {
        let report = advanced(
            harness
                .orchestrator
                .deliver(income_verified(&harness, role))
                .expect("income delivery"),
        );
        if index < order.len() - 1 {
            assert_eq!(report.status, RunStatus::Suspended);
            assert!(!report.passed(AssessmentStep::Calculate));
        }
        last = Some(report);
    }

    let report = last.expect("final report");
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(harness.adapters.gateway.calculation_count(AssessmentId(1)), 1);
    let output = harness
        .adapters
        .gateway
        .saved_output(AssessmentId(1))
        .expect("output saved");
    assert_eq!(output.family_size, 4);
}

#[test]
fn parents_without_sin_are_not_contacted() {
    let harness = Harness::new();
    harness.seed(
        1,
        100,
        ApplicationStatus::InProgress,
        false,
        dependant_with_parents([false, false]),
    );

    let report = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
    assert!(harness.adapters.supporting_users.created().is_empty());
    assert_eq!(harness.adapters.verifications.dispatched().len(), 1);
}

#[test]
fn declined_change_request_ends_without_calculation() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::Completed, true, input_json());
    harness
        .adapters
        .gateway
        .set_change_request_decision(ApplicationId(100), ChangeRequestDecision::Declined);

    let report = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::ChangeRequest))
        .expect("run starts");

    assert_eq!(report.status, RunStatus::Declined);
    assert_eq!(
        report.milestones,
        vec![
            AssessmentStep::AssociateInstance,
            AssessmentStep::LoadData,
            AssessmentStep::VerifyExceptions,
            AssessmentStep::ApprovalGate,
            AssessmentStep::Done,
        ]
    );
    let gateway = &harness.adapters.gateway;
    assert_eq!(gateway.calculation_count(AssessmentId(1)), 0);
    assert!(gateway.disbursements(AssessmentId(1)).is_empty());
    assert!(!gateway.agreement_associated(AssessmentId(1)));
    assert_eq!(gateway.noa_status(AssessmentId(1)), None);
    assert!(harness.adapters.verifications.dispatched().is_empty());
}

#[test]
fn pending_change_request_waits_for_decision() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::Completed, true, input_json());

    let report = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::ChangeRequest))
        .expect("run starts");
    let decided = CorrelatedMessage::for_application(
        MessageName::ApplicationChangeRequestDecided,
        ApplicationId(100),
    );
    assert_eq!(report.step, AssessmentStep::ApprovalGate);
    assert_eq!(report.waiting_on, vec![decided]);

    harness
        .adapters
        .gateway
        .set_change_request_decision(ApplicationId(100), ChangeRequestDecision::Approved);
    let report = advanced(harness.orchestrator.deliver(decided).expect("decision"));
    assert!(report.passed(AssessmentStep::ApprovalGate));
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);

    let report = advanced(
        harness
            .orchestrator
            .deliver(income_verified(&harness, PartyRole::Student))
            .expect("income delivery"),
    );
    assert_eq!(report.status, RunStatus::Completed);
    let gateway = &harness.adapters.gateway;
    assert_eq!(gateway.noa_status(AssessmentId(1)), Some(NoaStatus::Required));
    assert_eq!(
        gateway.application_status(ApplicationId(100)),
        Some(ApplicationStatus::Assessment)
    );
}

#[test]
fn approved_edit_status_skips_the_decision_lookup() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::Completed, true, input_json());

    let mut start = entry(1, AssessmentTrigger::ChangeRequest);
    start.application_edit_status = Some(ApplicationEditStatus::ChangedWithApproval);
    let report = harness.orchestrator.start(start).expect("run starts");

    assert!(report.passed(AssessmentStep::ApprovalGate));
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
}

#[test]
fn older_assessment_is_superseded_before_calculation() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::InProgress, false, input_json());
    harness.seed(2, 100, ApplicationStatus::InProgress, false, input_json());

    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    let err = harness
        .orchestrator
        .deliver(income_verified(&harness, PartyRole::Student))
        .expect_err("older run is superseded");

    match err {
        WorkflowError::Superseded {
            assessment_id,
            newer,
            milestones,
        } => {
            assert_eq!(assessment_id, AssessmentId(1));
            assert_eq!(newer, AssessmentId(2));
            assert!(milestones.contains(&AssessmentStep::IncomeVerificationJoin));
            assert!(!milestones.contains(&AssessmentStep::Calculate));
        }
        other => panic!("expected superseded, got {other:?}"),
    }

    let report = harness
        .orchestrator
        .report(AssessmentId(1))
        .expect("instance persisted");
    assert_eq!(report.status, RunStatus::Superseded);
    assert_eq!(harness.adapters.gateway.calculation_count(AssessmentId(1)), 0);
}

#[test]
fn exceptions_and_program_info_each_hold_the_run() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::InProgress, false, input_json());
    harness
        .adapters
        .gateway
        .set_pending_exceptions(ApplicationId(100), true);
    harness
        .adapters
        .gateway
        .set_program_info_required(ApplicationId(100), true);

    let report = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    assert_eq!(report.step, AssessmentStep::VerifyExceptions);

    let exceptions = CorrelatedMessage::for_application(
        MessageName::ApplicationExceptionsVerified,
        ApplicationId(100),
    );
    let report = advanced(harness.orchestrator.deliver(exceptions).expect("exceptions"));
    assert_eq!(report.step, AssessmentStep::ProgramInfo);
    assert!(report.passed(AssessmentStep::VerifyExceptions));

    let program_info =
        CorrelatedMessage::for_application(MessageName::ProgramInfoCompleted, ApplicationId(100));
    let report = advanced(harness.orchestrator.deliver(program_info).expect("program info"));
    assert!(report.passed(AssessmentStep::ProgramInfoRequired));
    assert!(!report.passed(AssessmentStep::ProgramInfoNotRequired));
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
}

#[test]
fn resume_is_idempotent_and_survives_restart() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::InProgress, false, input_json());
    let started = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");

    for _ in 0..2 {
        let resumed = harness
            .orchestrator
            .resume(AssessmentId(1))
            .expect("resume succeeds");
        assert_eq!(resumed, started);
    }
    assert_eq!(harness.adapters.verifications.dispatched().len(), 1);

    let restarted = Harness::orchestrator_for(&harness.adapters);
    let message = income_verified(&harness, PartyRole::Student);
    assert_eq!(
        restarted.deliver(message).expect("delivery"),
        Delivery::Unmatched,
        "waiters live in memory until the run is resumed"
    );

    let reports = restarted.resume_all().expect("resume all");
    assert_eq!(reports.len(), 1);
    let report = advanced(restarted.deliver(message).expect("delivery after resume"));
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(harness.adapters.verifications.dispatched().len(), 1);
}

#[test]
fn original_assessment_of_completed_application_keeps_its_status() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::Completed, false, input_json());
    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    advanced(
        harness
            .orchestrator
            .deliver(income_verified(&harness, PartyRole::Student))
            .expect("income delivery"),
    );

    let gateway = &harness.adapters.gateway;
    assert_eq!(gateway.noa_status(AssessmentId(1)), Some(NoaStatus::NotRequired));
    assert_eq!(
        gateway.application_status(ApplicationId(100)),
        Some(ApplicationStatus::Completed)
    );
}

#[test]
fn appeal_requires_noa_even_when_previously_approved() {
    let harness = Harness::new();
    harness.seed(1, 100, ApplicationStatus::Completed, true, input_json());
    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::StudentAppeal))
        .expect("run starts");
    let report = advanced(
        harness
            .orchestrator
            .deliver(income_verified(&harness, PartyRole::Student))
            .expect("income delivery"),
    );

    assert_eq!(report.status, RunStatus::Completed);
    assert!(!report.passed(AssessmentStep::ApprovalGate));
    assert_eq!(
        harness.adapters.gateway.noa_status(AssessmentId(1)),
        Some(NoaStatus::Required)
    );
    assert_eq!(
        harness.adapters.gateway.application_status(ApplicationId(100)),
        Some(ApplicationStatus::Assessment)
    );
}

#[test]
fn disbursements_split_for_long_offerings() {
    let harness = Harness::new();
    let mut value = input_json();
    value["offering"]["startDate"] = serde_json::json!("2023-08-01");
    value["offering"]["endDate"] = serde_json::json!("2024-01-31");
    value["offering"]["weeks"] = serde_json::json!(26);
    harness.seed(1, 100, ApplicationStatus::InProgress, false, value);

    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect("run starts");
    advanced(
        harness
            .orchestrator
            .deliver(income_verified(&harness, PartyRole::Student))
            .expect("income delivery"),
    );

    let records = harness.adapters.gateway.disbursements(AssessmentId(1));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].disbursement_date, common::today());
    assert_eq!(
        records[1].disbursement_date,
        chrono::NaiveDate::from_ymd_opt(2023, 10, 31).expect("valid date")
    );
}

fn exceptions_verified(application_id: u64) -> CorrelatedMessage {
    CorrelatedMessage::for_application(
        MessageName::ApplicationExceptionsVerified,
        ApplicationId(application_id),
    )
}

#[test]
fn newer_run_takes_over_the_application_wait_and_supersedes_the_earlier_one() {
    let harness = Harness::new();
    harness.seed(5, 100, ApplicationStatus::InProgress, false, input_json());
    harness.seed(6, 100, ApplicationStatus::InProgress, false, input_json());
    harness
        .adapters
        .gateway
        .set_pending_exceptions(ApplicationId(100), true);

    for id in [5, 6] {
        let report = harness
            .orchestrator
            .start(entry(id, AssessmentTrigger::OriginalAssessment))
            .expect("run starts");
        assert_eq!(report.step, AssessmentStep::VerifyExceptions);
    }

    let earlier = harness.orchestrator.report(AssessmentId(5)).expect("persisted");
    assert_eq!(earlier.status, RunStatus::Superseded);
    assert!(earlier.passed(AssessmentStep::LoadData));

    let resumed = harness
        .orchestrator
        .resume(AssessmentId(5))
        .expect("resume of a finished run");
    assert_eq!(resumed.status, RunStatus::Superseded);

    let report = advanced(
        harness
            .orchestrator
            .deliver(exceptions_verified(100))
            .expect("exceptions delivery"),
    );
    assert_eq!(report.assessment_id, AssessmentId(6));
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
    assert_eq!(
        harness
            .orchestrator
            .deliver(exceptions_verified(100))
            .expect("redelivery"),
        Delivery::Duplicate {
            assessment_id: AssessmentId(6)
        }
    );

    let report = advanced(
        harness
            .orchestrator
            .deliver(income_verified(&harness, PartyRole::Student))
            .expect("income delivery"),
    );
    assert_eq!(report.status, RunStatus::Completed);
    let gateway = &harness.adapters.gateway;
    assert_eq!(gateway.calculation_count(AssessmentId(6)), 1);
    assert_eq!(gateway.calculation_count(AssessmentId(5)), 0);
}

#[test]
fn earlier_run_gives_way_when_a_newer_one_already_waits() {
    let harness = Harness::new();
    harness.seed(5, 100, ApplicationStatus::InProgress, false, input_json());
    harness.seed(6, 100, ApplicationStatus::InProgress, false, input_json());
    harness
        .adapters
        .gateway
        .set_pending_exceptions(ApplicationId(100), true);

    harness
        .orchestrator
        .start(entry(6, AssessmentTrigger::OriginalAssessment))
        .expect("newer run starts");
    let err = harness
        .orchestrator
        .start(entry(5, AssessmentTrigger::OriginalAssessment))
        .expect_err("earlier run yields");
    assert!(matches!(
        err,
        WorkflowError::Superseded {
            assessment_id: AssessmentId(5),
            newer: AssessmentId(6),
            ..
        }
    ));

    let restarted = Harness::orchestrator_for(&harness.adapters);
    let reports = restarted.resume_all().expect("resume all");
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].assessment_id, AssessmentId(6));

    let report = advanced(
        restarted
            .deliver(exceptions_verified(100))
            .expect("exceptions delivery"),
    );
    assert_eq!(report.assessment_id, AssessmentId(6));
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
}

#[test]
fn supporting_user_failure_keeps_parents_already_created() {
    let harness = Harness::new();
    harness.seed(
        1,
        100,
        ApplicationStatus::InProgress,
        false,
        dependant_with_parents([true, true]),
    );
    let supporting_users = &harness.adapters.supporting_users;
    supporting_users.set_unavailable(PartyRole::Parent2, true);

    let err = harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect_err("parent 2 creation fails");
    assert!(matches!(err, WorkflowError::Gateway(_)));

    supporting_users.set_unavailable(PartyRole::Parent2, false);
    let report = harness
        .orchestrator
        .resume(AssessmentId(1))
        .expect("resume after recovery");
    assert_eq!(report.step, AssessmentStep::IdentifySupportingUsers);
    assert_eq!(report.waiting_on.len(), 2);
    let roles: Vec<PartyRole> = supporting_users
        .created()
        .into_iter()
        .map(|(_, role, _)| role)
        .collect();
    assert_eq!(roles, vec![PartyRole::Parent1, PartyRole::Parent2]);

    for role in [PartyRole::Parent1, PartyRole::Parent2] {
        advanced(
            harness
                .orchestrator
                .deliver(supporting_info(&harness, role))
                .expect("supporting delivery"),
        );
    }
    let report = harness.orchestrator.report(AssessmentId(1)).expect("persisted");
    assert_eq!(report.step, AssessmentStep::IncomeVerificationJoin);
}

#[test]
fn verification_failure_keeps_branches_already_dispatched() {
    let harness = Harness::new();
    let mut value = input_json();
    value["student"]["relationshipStatus"] = serde_json::json!("married");
    value["partner"] = serde_json::json!({ "income": "20000" });
    harness.seed(1, 100, ApplicationStatus::InProgress, false, value);
    let verifications = &harness.adapters.verifications;
    verifications.set_unavailable(PartyRole::Partner, true);

    harness
        .orchestrator
        .start(entry(1, AssessmentTrigger::OriginalAssessment))
        .expect_err("partner dispatch fails");
    assert_eq!(verifications.dispatched().len(), 1);

    verifications.set_unavailable(PartyRole::Partner, false);
    let report = harness
        .orchestrator
        .resume(AssessmentId(1))
        .expect("resume after recovery");
    assert_eq!(report.waiting_on.len(), 2);
    let roles: Vec<PartyRole> = verifications
        .dispatched()
        .into_iter()
        .map(|request| request.role)
        .collect();
    assert_eq!(roles, vec![PartyRole::Student, PartyRole::Partner]);

    for role in [PartyRole::Student, PartyRole::Partner] {
        advanced(
            harness
                .orchestrator
                .deliver(income_verified(&harness, role))
                .expect("income delivery"),
        );
    }
    let report = harness.orchestrator.report(AssessmentId(1)).expect("persisted");
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(harness.adapters.gateway.calculation_count(AssessmentId(1)), 1);
}
