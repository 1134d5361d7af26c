use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calculator::CalculatedAssessmentOutput;
use crate::disbursement::DisbursementRecord;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// One assessment attempt of an application.
    AssessmentId
);
numeric_id!(ApplicationId);
numeric_id!(SupportingUserId);
numeric_id!(
    /// Correlation key of the `income-verified` message.
    VerificationId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentTrigger {
    OriginalAssessment,
    StudentAppeal,
    ChangeRequest,
}

impl AssessmentTrigger {
    pub const fn label(self) -> &'static str {
        match self {
            Self::OriginalAssessment => "original assessment",
            Self::StudentAppeal => "student appeal",
            Self::ChangeRequest => "change request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    InProgress,
    Assessment,
    Enrolment,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationEditStatus {
    Original,
    ChangeInProgress,
    ChangePendingApproval,
    ChangedWithApproval,
    ChangeDeclined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoaStatus {
    Required,
    NotRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeRequestDecision {
    Pending,
    Approved,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Student,
    Parent1,
    Parent2,
    Partner,
}

impl PartyRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Parent1 => "parent 1",
            Self::Parent2 => "parent 2",
            Self::Partner => "partner",
        }
    }
}

/// Application facts read during the load step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub assessment_id: AssessmentId,
    pub application_id: ApplicationId,
    pub application_status: ApplicationStatus,
    /// The application already carries an approved notice of assessment.
    pub noa_approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: VerificationId,
    pub role: PartyRole,
    pub status: VerificationStatus,
}

impl VerificationRequest {
    pub fn correlation(&self) -> CorrelatedMessage {
        CorrelatedMessage::new(MessageName::IncomeVerified, self.id.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportingPartyStatus {
    AwaitingInfo,
    InfoReceived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportingPartyRecord {
    pub id: SupportingUserId,
    pub role: PartyRole,
    pub able_to_report: bool,
    pub status: SupportingPartyStatus,
}

impl SupportingPartyRecord {
    pub fn correlation(&self) -> CorrelatedMessage {
        CorrelatedMessage::new(MessageName::SupportingUserInfoReceived, self.id.0)
    }
}

/// Which parties take part, fixed when the application data is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyPlan {
    pub partner: bool,
    /// Identifiable parents in parent order.
    pub parents: Vec<PartyRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageName {
    SupportingUserInfoReceived,
    IncomeVerified,
    ApplicationExceptionsVerified,
    ProgramInfoCompleted,
    ApplicationChangeRequestDecided,
}

impl MessageName {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SupportingUserInfoReceived => "supporting-user-info-received",
            Self::IncomeVerified => "income-verified",
            Self::ApplicationExceptionsVerified => "application-exceptions-verified",
            Self::ProgramInfoCompleted => "program-info-completed",
            Self::ApplicationChangeRequestDecided => "application-change-request-decided",
        }
    }
}

/// A message name plus the key it is correlated on. Payloads carry no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedMessage {
    pub name: MessageName,
    pub correlation_key: u64,
}

impl CorrelatedMessage {
    pub const fn new(name: MessageName, correlation_key: u64) -> Self {
        Self {
            name,
            correlation_key,
        }
    }

    pub const fn for_application(name: MessageName, application_id: ApplicationId) -> Self {
        Self::new(name, application_id.0)
    }
}

impl fmt::Display for CorrelatedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name.label(), self.correlation_key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentStep {
    AssociateInstance,
    LoadData,
    VerifyExceptions,
    ApprovalGate,
    ProgramInfo,
    ProgramInfoRequired,
    ProgramInfoNotRequired,
    IdentifySupportingUsers,
    IncomeVerificationJoin,
    VerifyCalculationOrder,
    Calculate,
    SaveDisbursements,
    AssociateAgreement,
    UpdateNoaStatus,
    UpdateApplicationStatus,
    Done,
}

impl AssessmentStep {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AssociateInstance => "associate instance",
            Self::LoadData => "load data",
            Self::VerifyExceptions => "verify exceptions",
            Self::ApprovalGate => "approval gate",
            Self::ProgramInfo => "program info",
            Self::ProgramInfoRequired => "program info required",
            Self::ProgramInfoNotRequired => "program info not required",
            Self::IdentifySupportingUsers => "identify supporting users",
            Self::IncomeVerificationJoin => "income verification join",
            Self::VerifyCalculationOrder => "verify calculation order",
            Self::Calculate => "calculate",
            Self::SaveDisbursements => "save disbursements",
            Self::AssociateAgreement => "associate agreement",
            Self::UpdateNoaStatus => "update noa status",
            Self::UpdateApplicationStatus => "update application status",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for AssessmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Suspended,
    Completed,
    Declined,
    Superseded,
}

impl RunStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Declined | Self::Superseded)
    }
}

/// Variables a run is started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub assessment_id: AssessmentId,
    pub trigger: AssessmentTrigger,
    #[serde(default)]
    pub application_status: Option<ApplicationStatus>,
    #[serde(default)]
    pub application_edit_status: Option<ApplicationEditStatus>,
}

/// Offering window kept from the calculation for the disbursement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingWindow {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weeks: u32,
}

/// Persisted state of one assessment run.
///
/// `step` is the next step to execute. Everything a step needs to decide whether its side
/// effect already happened is kept here, so a resumed run never repeats one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    pub entry: ProcessEntry,
    pub step: AssessmentStep,
    pub status: RunStatus,
    pub milestones: Vec<AssessmentStep>,
    pub record: Option<AssessmentRecord>,
    pub parties: PartyPlan,
    pub supporting_parties: Vec<SupportingPartyRecord>,
    pub verifications: Vec<VerificationRequest>,
    pub waiting_on: Vec<CorrelatedMessage>,
    pub received: Vec<CorrelatedMessage>,
    pub offering: Option<OfferingWindow>,
    pub output: Option<CalculatedAssessmentOutput>,
    pub disbursements: Vec<DisbursementRecord>,
    pub noa_status: Option<NoaStatus>,
    pub application_status: Option<ApplicationStatus>,
}

impl ProcessInstance {
    pub fn new(entry: ProcessEntry) -> Self {
        Self {
            entry,
            step: AssessmentStep::AssociateInstance,
            status: RunStatus::Running,
            milestones: Vec::new(),
            record: None,
            parties: PartyPlan::default(),
            supporting_parties: Vec::new(),
            verifications: Vec::new(),
            waiting_on: Vec::new(),
            received: Vec::new(),
            offering: None,
            output: None,
            disbursements: Vec::new(),
            noa_status: None,
            application_status: None,
        }
    }

    pub fn assessment_id(&self) -> AssessmentId {
        self.entry.assessment_id
    }

    pub fn has_received(&self, message: &CorrelatedMessage) -> bool {
        self.received.contains(message)
    }

    fn is_waiting_on(&self, message: &CorrelatedMessage) -> bool {
        self.waiting_on.contains(message)
    }

    pub(crate) fn wait_on(&mut self, message: CorrelatedMessage) {
        if !self.is_waiting_on(&message) {
            self.waiting_on.push(message);
        }
    }

    /// Moves a message from the waiting list to the received list and marks the
    /// matching branch record resolved.
    pub(crate) fn mark_received(&mut self, message: CorrelatedMessage) {
        self.waiting_on.retain(|pending| *pending != message);
        if !self.has_received(&message) {
            self.received.push(message);
        }
        match message.name {
            MessageName::IncomeVerified => {
                for request in &mut self.verifications {
                    if request.id.0 == message.correlation_key {
                        request.status = VerificationStatus::Verified;
                    }
                }
            }
            MessageName::SupportingUserInfoReceived => {
                for party in &mut self.supporting_parties {
                    if party.id.0 == message.correlation_key {
                        party.status = SupportingPartyStatus::InfoReceived;
                    }
                }
            }
            _ => {}
        }
    }

    /// Clears a received application-keyed message so its step can wait again.
    pub(crate) fn forget(&mut self, message: &CorrelatedMessage) {
        self.received.retain(|received| received != message);
    }

    pub(crate) fn pass(&mut self, step: AssessmentStep, next: AssessmentStep) {
        self.milestones.push(step);
        self.step = next;
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            assessment_id: self.assessment_id(),
            trigger: self.entry.trigger,
            status: self.status,
            step: self.step,
            milestones: self.milestones.clone(),
            waiting_on: self.waiting_on.clone(),
        }
    }
}

/// Externally visible summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub assessment_id: AssessmentId,
    pub trigger: AssessmentTrigger,
    pub status: RunStatus,
    pub step: AssessmentStep,
    pub milestones: Vec<AssessmentStep>,
    pub waiting_on: Vec<CorrelatedMessage>,
}

impl RunReport {
    pub fn passed(&self, step: AssessmentStep) -> bool {
        self.milestones.contains(&step)
    }
}
