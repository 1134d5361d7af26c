use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::calculator::AssessmentCalculator;
use crate::disbursement::{self, ScheduleRequest};

use super::domain::{
    ApplicationEditStatus, ApplicationId, ApplicationStatus, AssessmentId, AssessmentStep,
    AssessmentTrigger, ChangeRequestDecision, CorrelatedMessage, MessageName, NoaStatus,
    OfferingWindow, PartyPlan, ProcessEntry, ProcessInstance, RunReport, RunStatus,
};
use super::income::IncomeVerificationCoordinator;
use super::ports::{
    AssessmentGateway, Clock, GatewayError, IncomeVerificationResponder, InstanceStore,
    SupportingUserGateway,
};
use super::supporting::{identifiable_parents, SupportingPartyCoordinator};
use super::waiters::{Registration, Resolution, WaiterTable};
use super::JoinState;

/// Collaborators the orchestrator talks to.
#[derive(Clone)]
pub struct AssessmentPorts {
    pub gateway: Arc<dyn AssessmentGateway>,
    pub supporting_users: Arc<dyn SupportingUserGateway>,
    pub verifications: Arc<dyn IncomeVerificationResponder>,
    pub store: Arc<dyn InstanceStore>,
    pub clock: Arc<dyn Clock>,
}

/// Outcome of delivering a correlated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Delivery {
    Advanced(RunReport),
    /// The key was already resolved; nothing ran.
    Duplicate {
        #[serde(rename = "assessmentId")]
        assessment_id: AssessmentId,
    },
    /// No run is waiting on the key.
    Unmatched,
}

enum Flow {
    Continue,
    Suspend,
    Finish(RunStatus),
    Supersede(AssessmentId),
}

/// Explicit state machine driving one assessment from association to status updates.
///
/// Every transition runs under a single lock that also guards the waiter table, so a
/// message delivery and a resume of the same run never interleave.
pub struct AssessmentOrchestrator {
    ports: AssessmentPorts,
    calculator: AssessmentCalculator,
    transitions: Mutex<WaiterTable>,
}

impl AssessmentOrchestrator {
    pub fn new(ports: AssessmentPorts, calculator: AssessmentCalculator) -> Self {
        Self {
            ports,
            calculator,
            transitions: Mutex::new(WaiterTable::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaiterTable> {
        self.transitions.lock().expect("transition lock poisoned")
    }

    pub fn start(&self, entry: ProcessEntry) -> Result<RunReport, WorkflowError> {
        let mut waiters = self.lock();
        if self.ports.store.load(entry.assessment_id)?.is_some() {
            return Err(WorkflowError::AlreadyStarted(entry.assessment_id));
        }
        info!(
            assessment_id = %entry.assessment_id,
            trigger = entry.trigger.label(),
            "assessment run started"
        );
        let mut instance = ProcessInstance::new(entry);
        self.advance(&mut instance, &mut waiters)
    }

    pub fn deliver(&self, message: CorrelatedMessage) -> Result<Delivery, WorkflowError> {
        let mut waiters = self.lock();
        match waiters.resolve(&message) {
            Resolution::Unknown => {
                warn!(%message, "no assessment waiting on message");
                Ok(Delivery::Unmatched)
            }
            Resolution::Duplicate(assessment_id) => {
                debug!(%message, %assessment_id, "duplicate message ignored");
                Ok(Delivery::Duplicate { assessment_id })
            }
            Resolution::Resolved(assessment_id) => {
                let mut instance = self.load(assessment_id)?;
                instance.mark_received(message);
                self.ports.store.save(&instance)?;
                info!(%message, %assessment_id, "message received");
                if instance.status.is_terminal() {
                    return Ok(Delivery::Advanced(instance.report()));
                }
                self.advance(&mut instance, &mut waiters)
                    .map(Delivery::Advanced)
            }
        }
    }

    /// Re-enters a persisted run at its current step, re-arming its waiters.
    pub fn resume(&self, assessment_id: AssessmentId) -> Result<RunReport, WorkflowError> {
        let mut waiters = self.lock();
        let mut instance = self.load(assessment_id)?;
        if instance.status.is_terminal() {
            return Ok(instance.report());
        }
        for message in instance.waiting_on.clone() {
            if let Some(newer) = self.claim(&instance, &mut waiters, message)? {
                return self.supersede(&mut instance, &mut waiters, newer);
            }
        }
        self.advance(&mut instance, &mut waiters)
    }

    /// Resumes every persisted run that has not finished. Runs that turn out to be
    /// superseded are reported with their final status.
    pub fn resume_all(&self) -> Result<Vec<RunReport>, WorkflowError> {
        let open: Vec<AssessmentId> = self
            .ports
            .store
            .list()?
            .into_iter()
            .filter(|instance| !instance.status.is_terminal())
            .map(|instance| instance.assessment_id())
            .collect();
        open.into_iter()
            .map(|id| match self.resume(id) {
                Err(WorkflowError::Superseded { .. }) => self.report(id),
                other => other,
            })
            .collect()
    }

    pub fn report(&self, assessment_id: AssessmentId) -> Result<RunReport, WorkflowError> {
        self.load(assessment_id).map(|instance| instance.report())
    }

    pub fn instance(&self, assessment_id: AssessmentId) -> Result<ProcessInstance, WorkflowError> {
        self.load(assessment_id)
    }

    fn load(&self, assessment_id: AssessmentId) -> Result<ProcessInstance, WorkflowError> {
        self.ports
            .store
            .load(assessment_id)?
            .ok_or(WorkflowError::NotFound(assessment_id))
    }

    fn advance(
        &self,
        instance: &mut ProcessInstance,
        waiters: &mut WaiterTable,
    ) -> Result<RunReport, WorkflowError> {
        let assessment_id = instance.assessment_id();
        let span = info_span!(
            "assessment",
            %assessment_id,
            trigger = instance.entry.trigger.label()
        );
        let _entered = span.enter();

        instance.status = RunStatus::Running;
        loop {
            let step = instance.step;
            let flow = match self.execute(step, instance, waiters) {
                Ok(flow) => flow,
                Err(err) => {
                    // Branch records created before the failure must survive a resume.
                    if let Err(save_err) = self.ports.store.save(instance) {
                        warn!(%step, error = %save_err, "partial progress not persisted");
                    }
                    warn!(%step, error = %err, "assessment step failed");
                    return Err(err);
                }
            };
            match flow {
                Flow::Continue => {
                    debug!(%step, next = %instance.step, "step passed");
                    self.ports.store.save(instance)?;
                }
                Flow::Suspend => {
                    instance.status = RunStatus::Suspended;
                    self.ports.store.save(instance)?;
                    info!(%step, waiting = instance.waiting_on.len(), "assessment suspended");
                    return Ok(instance.report());
                }
                Flow::Finish(status) => {
                    instance.status = status;
                    waiters.release(assessment_id);
                    self.ports.store.save(instance)?;
                    info!(?status, "assessment finished");
                    return Ok(instance.report());
                }
                Flow::Supersede(newer) => return self.supersede(instance, waiters, newer),
            }
        }
    }

    fn supersede(
        &self,
        instance: &mut ProcessInstance,
        waiters: &mut WaiterTable,
        newer: AssessmentId,
    ) -> Result<RunReport, WorkflowError> {
        let assessment_id = instance.assessment_id();
        instance.status = RunStatus::Superseded;
        waiters.release(assessment_id);
        self.ports.store.save(instance)?;
        warn!(%assessment_id, %newer, "assessment superseded by a newer assessment");
        Err(WorkflowError::Superseded {
            assessment_id,
            newer,
            milestones: instance.milestones.clone(),
        })
    }

    fn execute(
        &self,
        step: AssessmentStep,
        instance: &mut ProcessInstance,
        waiters: &mut WaiterTable,
    ) -> Result<Flow, WorkflowError> {
        let gateway = self.ports.gateway.as_ref();
        let assessment_id = instance.assessment_id();

        match step {
            AssessmentStep::AssociateInstance => {
                gateway.associate_instance(assessment_id)?;
                instance.pass(step, AssessmentStep::LoadData);
            }
            AssessmentStep::LoadData => {
                let record = gateway.load_assessment(assessment_id)?;
                let input = gateway.load_consolidated_input(assessment_id)?;
                instance.parties = PartyPlan {
                    partner: input.student.is_married(),
                    parents: identifiable_parents(&input),
                };
                instance.record = Some(record);
                instance.pass(step, AssessmentStep::VerifyExceptions);
            }
            AssessmentStep::VerifyExceptions => {
                let application_id = application_id(instance)?;
                let message = CorrelatedMessage::for_application(
                    MessageName::ApplicationExceptionsVerified,
                    application_id,
                );
                if !instance.has_received(&message)
                    && gateway.has_pending_exceptions(application_id)?
                {
                    return self.wait(instance, waiters, message);
                }
                instance.waiting_on.retain(|pending| *pending != message);
                let next = match instance.entry.trigger {
                    AssessmentTrigger::ChangeRequest => AssessmentStep::ApprovalGate,
                    _ => AssessmentStep::ProgramInfo,
                };
                instance.pass(step, next);
            }
            AssessmentStep::ApprovalGate => {
                let application_id = application_id(instance)?;
                let decision = match instance.entry.application_edit_status {
                    Some(ApplicationEditStatus::ChangedWithApproval) => ChangeRequestDecision::Approved,
                    Some(ApplicationEditStatus::ChangeDeclined) => ChangeRequestDecision::Declined,
                    _ => gateway.change_request_decision(application_id)?,
                };
                let message = CorrelatedMessage::for_application(
                    MessageName::ApplicationChangeRequestDecided,
                    application_id,
                );
                match decision {
                    ChangeRequestDecision::Approved => {
                        instance.pass(step, AssessmentStep::ProgramInfo);
                    }
                    ChangeRequestDecision::Declined => {
                        info!("change request declined");
                        instance.pass(step, AssessmentStep::Done);
                        instance.milestones.push(AssessmentStep::Done);
                        return Ok(Flow::Finish(RunStatus::Declined));
                    }
                    ChangeRequestDecision::Pending => {
                        instance.forget(&message);
                        return self.wait(instance, waiters, message);
                    }
                }
            }
            AssessmentStep::ProgramInfo => {
                let application_id = application_id(instance)?;
                let message = CorrelatedMessage::for_application(
                    MessageName::ProgramInfoCompleted,
                    application_id,
                );
                let outcome = if instance.has_received(&message) {
                    AssessmentStep::ProgramInfoRequired
                } else if gateway.program_info_required(application_id)? {
                    return self.wait(instance, waiters, message);
                } else {
                    AssessmentStep::ProgramInfoNotRequired
                };
                instance.step = outcome;
            }
            AssessmentStep::ProgramInfoRequired | AssessmentStep::ProgramInfoNotRequired => {
                instance.pass(step, AssessmentStep::IdentifySupportingUsers);
            }
            AssessmentStep::IdentifySupportingUsers => {
                let application_id = application_id(instance)?;
                let coordinator =
                    SupportingPartyCoordinator::new(self.ports.supporting_users.as_ref());
                if coordinator.identify(instance, application_id, waiters)? == JoinState::Waiting {
                    return Ok(Flow::Suspend);
                }
                instance.pass(step, AssessmentStep::IncomeVerificationJoin);
            }
            AssessmentStep::IncomeVerificationJoin => {
                let application_id = application_id(instance)?;
                let coordinator =
                    IncomeVerificationCoordinator::new(self.ports.verifications.as_ref());
                if coordinator.join(instance, application_id, waiters)? == JoinState::Waiting {
                    return Ok(Flow::Suspend);
                }
                instance.pass(step, AssessmentStep::VerifyCalculationOrder);
            }
            AssessmentStep::VerifyCalculationOrder => {
                let latest = gateway.latest_assessment(application_id(instance)?)?;
                if latest > assessment_id {
                    return Ok(Flow::Supersede(latest));
                }
                instance.pass(step, AssessmentStep::Calculate);
            }
            AssessmentStep::Calculate => {
                let input = gateway.load_consolidated_input(assessment_id)?;
                let output = self.calculator.calculate(&input);
                gateway.save_calculation(assessment_id, &output)?;
                info!(
                    family_size = output.family_size,
                    total_award = %output.total_award(),
                    "assessment calculated"
                );
                instance.offering = Some(OfferingWindow {
                    start_date: input.offering.start_date,
                    end_date: input.offering.end_date,
                    weeks: input.offering.weeks,
                });
                instance.output = Some(output);
                instance.pass(step, AssessmentStep::SaveDisbursements);
            }
            AssessmentStep::SaveDisbursements => {
                let (Some(offering), Some(output)) = (instance.offering, instance.output.as_ref())
                else {
                    return Err(WorkflowError::MissingState(assessment_id, step));
                };
                let request = ScheduleRequest {
                    start_date: offering.start_date,
                    end_date: offering.end_date,
                    weeks: offering.weeks,
                    today: self.ports.clock.today(),
                    awards: disbursement::awards_from_output(output),
                };
                let records = disbursement::schedule(&request);
                gateway.save_disbursements(assessment_id, &records)?;
                info!(records = records.len(), "disbursements saved");
                instance.disbursements = records;
                instance.pass(step, AssessmentStep::AssociateAgreement);
            }
            AssessmentStep::AssociateAgreement => {
                gateway.associate_agreement(assessment_id)?;
                instance.pass(step, AssessmentStep::UpdateNoaStatus);
            }
            AssessmentStep::UpdateNoaStatus => {
                let status = noa_status(
                    instance.entry.trigger,
                    current_application_status(instance)?,
                    instance.record.as_ref().is_some_and(|record| record.noa_approved),
                );
                gateway.update_noa_status(assessment_id, status)?;
                instance.noa_status = Some(status);
                instance.pass(step, AssessmentStep::UpdateApplicationStatus);
            }
            AssessmentStep::UpdateApplicationStatus => {
                let current = current_application_status(instance)?;
                let target = next_application_status(instance.entry.trigger, current);
                if target != current {
                    gateway.update_application_status(application_id(instance)?, target)?;
                }
                instance.application_status = Some(target);
                instance.pass(step, AssessmentStep::Done);
            }
            AssessmentStep::Done => {
                instance.milestones.push(AssessmentStep::Done);
                return Ok(Flow::Finish(RunStatus::Completed));
            }
        }
        Ok(Flow::Continue)
    }

    fn wait(
        &self,
        instance: &mut ProcessInstance,
        waiters: &mut WaiterTable,
        message: CorrelatedMessage,
    ) -> Result<Flow, WorkflowError> {
        if let Some(newer) = self.claim(instance, waiters, message)? {
            return Ok(Flow::Supersede(newer));
        }
        instance.wait_on(message);
        Ok(Flow::Suspend)
    }

    /// Arms `message` for the run. Application-keyed messages have a single waiter: a
    /// newer assessment already holding the key is returned, otherwise the key is taken
    /// over and the earlier holder finishes as superseded.
    fn claim(
        &self,
        instance: &ProcessInstance,
        waiters: &mut WaiterTable,
        message: CorrelatedMessage,
    ) -> Result<Option<AssessmentId>, WorkflowError> {
        let assessment_id = instance.assessment_id();
        if let Some(holder) = waiters.pending_holder(&message) {
            if holder > assessment_id {
                return Ok(Some(holder));
            }
        }
        if let Registration::TakenOver(previous) = waiters.register(message, assessment_id) {
            warn!(%message, %previous, "message key taken over from an earlier assessment");
            self.retire(previous, assessment_id, waiters)?;
        }
        Ok(None)
    }

    fn retire(
        &self,
        previous: AssessmentId,
        newer: AssessmentId,
        waiters: &mut WaiterTable,
    ) -> Result<(), WorkflowError> {
        let Some(mut earlier) = self.ports.store.load(previous)? else {
            return Ok(());
        };
        if earlier.status.is_terminal() {
            return Ok(());
        }
        earlier.status = RunStatus::Superseded;
        waiters.release(previous);
        self.ports.store.save(&earlier)?;
        warn!(assessment_id = %previous, %newer, "waiting assessment superseded");
        Ok(())
    }
}

fn application_id(instance: &ProcessInstance) -> Result<ApplicationId, WorkflowError> {
    instance
        .record
        .as_ref()
        .map(|record| record.application_id)
        .ok_or(WorkflowError::MissingState(instance.assessment_id(), instance.step))
}

/// Status supplied with the run wins over the one read at load time.
fn current_application_status(instance: &ProcessInstance) -> Result<ApplicationStatus, WorkflowError> {
    instance
        .entry
        .application_status
        .or_else(|| instance.record.as_ref().map(|record| record.application_status))
        .ok_or(WorkflowError::MissingState(instance.assessment_id(), instance.step))
}

pub fn noa_status(
    trigger: AssessmentTrigger,
    application_status: ApplicationStatus,
    noa_approved: bool,
) -> NoaStatus {
    match trigger {
        AssessmentTrigger::OriginalAssessment
            if application_status == ApplicationStatus::Completed || noa_approved =>
        {
            NoaStatus::NotRequired
        }
        _ => NoaStatus::Required,
    }
}

pub fn next_application_status(
    trigger: AssessmentTrigger,
    current: ApplicationStatus,
) -> ApplicationStatus {
    match trigger {
        AssessmentTrigger::OriginalAssessment if current == ApplicationStatus::Completed => current,
        _ => ApplicationStatus::Assessment,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("assessment {0} not found")]
    NotFound(AssessmentId),
    #[error("assessment {0} already started")]
    AlreadyStarted(AssessmentId),
    #[error("assessment {assessment_id} superseded by newer assessment {newer}")]
    Superseded {
        assessment_id: AssessmentId,
        newer: AssessmentId,
        milestones: Vec<AssessmentStep>,
    },
    #[error("assessment {0} reached {1} without the data it needs")]
    MissingState(AssessmentId, AssessmentStep),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("assessment worker unavailable")]
    WorkerUnavailable,
}
