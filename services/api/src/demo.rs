use crate::infra::parse_date;
use aid_assessment::calculator::{AssessmentCalculator, ConsolidatedAssessmentInput};
use aid_assessment::disbursement::DisbursementRecord;
use aid_assessment::error::AppError;
use aid_assessment::workflow::{
    ApplicationId, ApplicationStatus, AssessmentId, AssessmentOrchestrator, AssessmentRecord,
    AssessmentTrigger, Clock, CorrelatedMessage, Delivery, FixedClock, InMemoryAdapters,
    MessageName, ProcessEntry, RunReport, SystemClock,
};
use chrono::{Duration, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the run date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

const DEMO_ASSESSMENT: AssessmentId = AssessmentId(1001);
const DEMO_APPLICATION: ApplicationId = ApplicationId(501);

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| SystemClock.today());

    let adapters = InMemoryAdapters::default();
    adapters.gateway.insert_assessment(
        AssessmentRecord {
            assessment_id: DEMO_ASSESSMENT,
            application_id: DEMO_APPLICATION,
            application_status: ApplicationStatus::InProgress,
            noa_approved: false,
        },
        demo_input(today)?,
    );
    let orchestrator = AssessmentOrchestrator::new(
        adapters.ports(Arc::new(FixedClock(today))),
        AssessmentCalculator::default(),
    );

    println!("Student aid assessment demo ({today})");
    println!("Dependant student, parent 1 reporting, parent 2 without a SIN, 30-week offering");

    let report = orchestrator.start(ProcessEntry {
        assessment_id: DEMO_ASSESSMENT,
        trigger: AssessmentTrigger::OriginalAssessment,
        application_status: None,
        application_edit_status: None,
    })?;
    render_report("started", &report);

    for (_, role, id) in adapters.supporting_users.created() {
        let message = CorrelatedMessage::new(MessageName::SupportingUserInfoReceived, id.0);
        let delivery = orchestrator.deliver(message)?;
        render_delivery(&format!("{} info received", role.label()), &delivery);
    }

    for request in adapters.verifications.dispatched() {
        let message = CorrelatedMessage::new(MessageName::IncomeVerified, request.id.0);
        let delivery = orchestrator.deliver(message)?;
        render_delivery(&format!("{} income verified", request.role.label()), &delivery);
    }

    if let Some(output) = adapters.gateway.saved_output(DEMO_ASSESSMENT) {
        println!("\nAwards (family size {}):", output.family_size);
        for (code, result) in &output.awards {
            match result.eligible {
                Some(true) => println!("  {:<5} {:>10}", code.label(), result.amount.to_string()),
                Some(false) => println!("  {:<5} {:>10}", code.label(), "ineligible"),
                None => {}
            }
        }
        println!("  total {:>10}", output.total_award().to_string());
    }

    render_disbursements(&adapters.gateway.disbursements(DEMO_ASSESSMENT));

    if let Some(status) = adapters.gateway.noa_status(DEMO_ASSESSMENT) {
        println!("\nNotice of assessment: {status:?}");
    }
    if let Some(status) = adapters.gateway.application_status(DEMO_APPLICATION) {
        println!("Application status: {status:?}");
    }
    Ok(())
}

fn demo_input(today: NaiveDate) -> Result<ConsolidatedAssessmentInput, AppError> {
    let start = today + Duration::days(14);
    let end = start + Duration::weeks(30);
    let input = serde_json::from_value(json!({
        "programYear": "2023-2024",
        "student": {
            "dependencyStatus": "dependant",
            "taxableIncome": "6500",
            "transportationCosts": "400"
        },
        "offering": {
            "startDate": start.to_string(),
            "endDate": end.to_string(),
            "weeks": 30,
            "tuition": "5200",
            "booksAndSupplies": "1400",
            "mandatoryFees": "650"
        },
        "parents": [
            { "ableToReport": true, "totalIncome": "58000", "cppDeduction": "3100", "dependants": 1 },
            { "ableToReport": false }
        ]
    }))?;
    Ok(input)
}

fn render_report(event: &str, report: &RunReport) {
    println!("\n[{event}] status {:?}, next step {}", report.status, report.step);
    let milestones: Vec<&str> = report.milestones.iter().map(|step| step.label()).collect();
    println!("  milestones: {}", milestones.join(" > "));
    for message in &report.waiting_on {
        println!("  waiting on {message}");
    }
}

fn render_delivery(event: &str, delivery: &Delivery) {
    match delivery {
        Delivery::Advanced(report) => render_report(event, report),
        Delivery::Duplicate { assessment_id } => {
            println!("\n[{event}] duplicate for assessment {assessment_id}")
        }
        Delivery::Unmatched => println!("\n[{event}] no run waiting"),
    }
}

fn render_disbursements(records: &[DisbursementRecord]) {
    println!("\nDisbursements:");
    for record in records {
        let total: Decimal = record
            .awards
            .iter()
            .filter(|value| value.eligible)
            .map(|value| value.value_amount)
            .sum();
        println!(
            "  {}  {} awards  {}",
            record.disbursement_date,
            record.awards.len(),
            total
        );
    }
}
