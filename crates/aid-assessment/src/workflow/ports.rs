use chrono::{NaiveDate, Utc};

use crate::calculator::{CalculatedAssessmentOutput, ConsolidatedAssessmentInput};
use crate::disbursement::DisbursementRecord;

use super::domain::{
    ApplicationId, ApplicationStatus, AssessmentId, AssessmentRecord, ChangeRequestDecision,
    NoaStatus, PartyRole, ProcessInstance, SupportingUserId, VerificationId, VerificationRequest,
};

/// Application data and status updates owned by the surrounding system.
pub trait AssessmentGateway: Send + Sync {
    fn associate_instance(&self, assessment_id: AssessmentId) -> Result<(), GatewayError>;
    fn load_assessment(&self, assessment_id: AssessmentId) -> Result<AssessmentRecord, GatewayError>;
    /// Builds the consolidated input from the current application data.
    fn load_consolidated_input(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<ConsolidatedAssessmentInput, GatewayError>;
    fn has_pending_exceptions(&self, application_id: ApplicationId) -> Result<bool, GatewayError>;
    fn change_request_decision(
        &self,
        application_id: ApplicationId,
    ) -> Result<ChangeRequestDecision, GatewayError>;
    fn program_info_required(&self, application_id: ApplicationId) -> Result<bool, GatewayError>;
    /// Most recent assessment created for the application.
    fn latest_assessment(&self, application_id: ApplicationId) -> Result<AssessmentId, GatewayError>;
    fn save_calculation(
        &self,
        assessment_id: AssessmentId,
        output: &CalculatedAssessmentOutput,
    ) -> Result<(), GatewayError>;
    fn save_disbursements(
        &self,
        assessment_id: AssessmentId,
        records: &[DisbursementRecord],
    ) -> Result<(), GatewayError>;
    /// Links the assessment to the student's master loan agreement.
    fn associate_agreement(&self, assessment_id: AssessmentId) -> Result<(), GatewayError>;
    fn update_noa_status(
        &self,
        assessment_id: AssessmentId,
        status: NoaStatus,
    ) -> Result<(), GatewayError>;
    fn update_application_status(
        &self,
        application_id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), GatewayError>;
}

pub trait SupportingUserGateway: Send + Sync {
    fn create_supporting_user(
        &self,
        application_id: ApplicationId,
        role: PartyRole,
    ) -> Result<SupportingUserId, GatewayError>;
}

/// Income verification service. Results come back as `income-verified` messages.
pub trait IncomeVerificationResponder: Send + Sync {
    fn allocate(&self, assessment_id: AssessmentId, role: PartyRole)
        -> Result<VerificationId, GatewayError>;
    fn dispatch(
        &self,
        application_id: ApplicationId,
        request: &VerificationRequest,
    ) -> Result<(), GatewayError>;
}

pub trait InstanceStore: Send + Sync {
    fn save(&self, instance: &ProcessInstance) -> Result<(), GatewayError>;
    fn load(&self, assessment_id: AssessmentId) -> Result<Option<ProcessInstance>, GatewayError>;
    fn list(&self) -> Result<Vec<ProcessInstance>, GatewayError>;
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("gateway rejected request: {0}")]
    Rejected(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}
