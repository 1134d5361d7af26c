//! Assessment workflow: the process orchestrator, its two coordinators, the message
//! waiter table, and the worker that owns them at runtime.

pub mod domain;
pub mod income;
pub mod memory;
pub mod orchestrator;
pub mod ports;
pub mod router;
pub mod supporting;
pub mod waiters;
pub mod worker;

/// Whether a fan-out step may move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Ready,
    Waiting,
}

pub use domain::{
    ApplicationEditStatus, ApplicationId, ApplicationStatus, AssessmentId, AssessmentRecord,
    AssessmentStep, AssessmentTrigger, ChangeRequestDecision, CorrelatedMessage, MessageName,
    NoaStatus, PartyRole, ProcessEntry, ProcessInstance, RunReport, RunStatus,
    SupportingPartyRecord, SupportingUserId, VerificationId, VerificationRequest,
};
pub use income::IncomeVerificationCoordinator;
pub use memory::InMemoryAdapters;
pub use orchestrator::{AssessmentOrchestrator, AssessmentPorts, Delivery, WorkflowError};
pub use ports::{
    AssessmentGateway, Clock, FixedClock, GatewayError, IncomeVerificationResponder,
    InstanceStore, SupportingUserGateway, SystemClock,
};
pub use router::assessment_router;
pub use supporting::SupportingPartyCoordinator;
pub use waiters::WaiterTable;
pub use worker::{AssessmentWorker, WorkerClient, WorkerHandle};
