//! In-memory adapters for every workflow port. Used by the demo, the HTTP service, and
//! tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::calculator::{CalculatedAssessmentOutput, ConsolidatedAssessmentInput};
use crate::disbursement::DisbursementRecord;

use super::domain::{
    ApplicationId, ApplicationStatus, AssessmentId, AssessmentRecord, ChangeRequestDecision,
    NoaStatus, PartyRole, ProcessInstance, SupportingUserId, VerificationId, VerificationRequest,
};
use super::orchestrator::AssessmentPorts;
use super::ports::{
    AssessmentGateway, Clock, GatewayError, IncomeVerificationResponder, InstanceStore,
    SupportingUserGateway,
};

#[derive(Default)]
struct GatewayState {
    records: HashMap<AssessmentId, AssessmentRecord>,
    inputs: HashMap<AssessmentId, ConsolidatedAssessmentInput>,
    pending_exceptions: HashSet<ApplicationId>,
    program_info_required: HashSet<ApplicationId>,
    change_requests: HashMap<ApplicationId, ChangeRequestDecision>,
    associated: Vec<AssessmentId>,
    calculations: HashMap<AssessmentId, Vec<CalculatedAssessmentOutput>>,
    disbursements: HashMap<AssessmentId, Vec<DisbursementRecord>>,
    agreements: Vec<AssessmentId>,
    noa_statuses: HashMap<AssessmentId, NoaStatus>,
    application_statuses: HashMap<ApplicationId, ApplicationStatus>,
}

#[derive(Default)]
pub struct InMemoryAssessmentGateway {
    state: RwLock<GatewayState>,
}

impl InMemoryAssessmentGateway {
    pub fn insert_assessment(&self, record: AssessmentRecord, input: ConsolidatedAssessmentInput) {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state
            .application_statuses
            .entry(record.application_id)
            .or_insert(record.application_status);
        state.inputs.insert(record.assessment_id, input);
        state.records.insert(record.assessment_id, record);
    }

    /// Replaces the consolidated input, as supporting users completing their data would.
    pub fn replace_input(&self, assessment_id: AssessmentId, input: ConsolidatedAssessmentInput) {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state.inputs.insert(assessment_id, input);
    }

    pub fn set_pending_exceptions(&self, application_id: ApplicationId, pending: bool) {
        let mut state = self.state.write().expect("gateway lock poisoned");
        if pending {
            state.pending_exceptions.insert(application_id);
        } else {
            state.pending_exceptions.remove(&application_id);
        }
    }

    pub fn set_program_info_required(&self, application_id: ApplicationId, required: bool) {
        let mut state = self.state.write().expect("gateway lock poisoned");
        if required {
            state.program_info_required.insert(application_id);
        } else {
            state.program_info_required.remove(&application_id);
        }
    }

    pub fn set_change_request_decision(
        &self,
        application_id: ApplicationId,
        decision: ChangeRequestDecision,
    ) {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state.change_requests.insert(application_id, decision);
    }

    pub fn calculation_count(&self, assessment_id: AssessmentId) -> usize {
        let state = self.state.read().expect("gateway lock poisoned");
        state
            .calculations
            .get(&assessment_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn saved_output(&self, assessment_id: AssessmentId) -> Option<CalculatedAssessmentOutput> {
        let state = self.state.read().expect("gateway lock poisoned");
        state
            .calculations
            .get(&assessment_id)
            .and_then(|outputs| outputs.last().cloned())
    }

    pub fn disbursements(&self, assessment_id: AssessmentId) -> Vec<DisbursementRecord> {
        let state = self.state.read().expect("gateway lock poisoned");
        state
            .disbursements
            .get(&assessment_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn agreement_associated(&self, assessment_id: AssessmentId) -> bool {
        let state = self.state.read().expect("gateway lock poisoned");
        state.agreements.contains(&assessment_id)
    }

    pub fn instance_associated(&self, assessment_id: AssessmentId) -> bool {
        let state = self.state.read().expect("gateway lock poisoned");
        state.associated.contains(&assessment_id)
    }

    pub fn noa_status(&self, assessment_id: AssessmentId) -> Option<NoaStatus> {
        let state = self.state.read().expect("gateway lock poisoned");
        state.noa_statuses.get(&assessment_id).copied()
    }

    pub fn application_status(&self, application_id: ApplicationId) -> Option<ApplicationStatus> {
        let state = self.state.read().expect("gateway lock poisoned");
        state.application_statuses.get(&application_id).copied()
    }

    fn record(&self, assessment_id: AssessmentId) -> Result<AssessmentRecord, GatewayError> {
        let state = self.state.read().expect("gateway lock poisoned");
        state
            .records
            .get(&assessment_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("assessment {assessment_id}")))
    }
}

impl AssessmentGateway for InMemoryAssessmentGateway {
    fn associate_instance(&self, assessment_id: AssessmentId) -> Result<(), GatewayError> {
        self.record(assessment_id)?;
        let mut state = self.state.write().expect("gateway lock poisoned");
        if !state.associated.contains(&assessment_id) {
            state.associated.push(assessment_id);
        }
        Ok(())
    }

    fn load_assessment(&self, assessment_id: AssessmentId) -> Result<AssessmentRecord, GatewayError> {
        let mut record = self.record(assessment_id)?;
        if let Some(status) = self.application_status(record.application_id) {
            record.application_status = status;
        }
        Ok(record)
    }

    fn load_consolidated_input(
        &self,
        assessment_id: AssessmentId,
    ) -> Result<ConsolidatedAssessmentInput, GatewayError> {
        let state = self.state.read().expect("gateway lock poisoned");
        state
            .inputs
            .get(&assessment_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("input for assessment {assessment_id}")))
    }

    fn has_pending_exceptions(&self, application_id: ApplicationId) -> Result<bool, GatewayError> {
        let state = self.state.read().expect("gateway lock poisoned");
        Ok(state.pending_exceptions.contains(&application_id))
    }

    fn change_request_decision(
        &self,
        application_id: ApplicationId,
    ) -> Result<ChangeRequestDecision, GatewayError> {
        let state = self.state.read().expect("gateway lock poisoned");
        Ok(state
            .change_requests
            .get(&application_id)
            .copied()
            .unwrap_or(ChangeRequestDecision::Pending))
    }

    fn program_info_required(&self, application_id: ApplicationId) -> Result<bool, GatewayError> {
        let state = self.state.read().expect("gateway lock poisoned");
        Ok(state.program_info_required.contains(&application_id))
    }

    fn latest_assessment(&self, application_id: ApplicationId) -> Result<AssessmentId, GatewayError> {
        let state = self.state.read().expect("gateway lock poisoned");
        state
            .records
            .values()
            .filter(|record| record.application_id == application_id)
            .map(|record| record.assessment_id)
            .max()
            .ok_or_else(|| GatewayError::NotFound(format!("application {application_id}")))
    }

    fn save_calculation(
        &self,
        assessment_id: AssessmentId,
        output: &CalculatedAssessmentOutput,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state
            .calculations
            .entry(assessment_id)
            .or_default()
            .push(output.clone());
        Ok(())
    }

    fn save_disbursements(
        &self,
        assessment_id: AssessmentId,
        records: &[DisbursementRecord],
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state.disbursements.insert(assessment_id, records.to_vec());
        Ok(())
    }

    fn associate_agreement(&self, assessment_id: AssessmentId) -> Result<(), GatewayError> {
        let mut state = self.state.write().expect("gateway lock poisoned");
        if !state.agreements.contains(&assessment_id) {
            state.agreements.push(assessment_id);
        }
        Ok(())
    }

    fn update_noa_status(
        &self,
        assessment_id: AssessmentId,
        status: NoaStatus,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state.noa_statuses.insert(assessment_id, status);
        Ok(())
    }

    fn update_application_status(
        &self,
        application_id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().expect("gateway lock poisoned");
        state.application_statuses.insert(application_id, status);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySupportingUsers {
    sequence: AtomicU64,
    created: Mutex<Vec<(ApplicationId, PartyRole, SupportingUserId)>>,
    unavailable: Mutex<HashSet<PartyRole>>,
}

impl InMemorySupportingUsers {
    /// Makes creation fail for `role` until switched back.
    pub fn set_unavailable(&self, role: PartyRole, unavailable: bool) {
        toggle(&self.unavailable, role, unavailable);
    }

    pub fn created(&self) -> Vec<(ApplicationId, PartyRole, SupportingUserId)> {
        self.created.lock().expect("supporting user mutex poisoned").clone()
    }

    pub fn id_for(&self, role: PartyRole) -> Option<SupportingUserId> {
        self.created()
            .into_iter()
            .rev()
            .find(|(_, created_role, _)| *created_role == role)
            .map(|(_, _, id)| id)
    }
}

impl SupportingUserGateway for InMemorySupportingUsers {
    fn create_supporting_user(
        &self,
        application_id: ApplicationId,
        role: PartyRole,
    ) -> Result<SupportingUserId, GatewayError> {
        ensure_available(&self.unavailable, role)?;
        let id = SupportingUserId(self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        self.created
            .lock()
            .expect("supporting user mutex poisoned")
            .push((application_id, role, id));
        Ok(id)
    }
}

#[derive(Default)]
pub struct InMemoryVerificationResponder {
    sequence: AtomicU64,
    dispatched: Mutex<Vec<VerificationRequest>>,
    unavailable: Mutex<HashSet<PartyRole>>,
}

impl InMemoryVerificationResponder {
    /// Makes dispatch fail for `role` until switched back.
    pub fn set_unavailable(&self, role: PartyRole, unavailable: bool) {
        toggle(&self.unavailable, role, unavailable);
    }

    pub fn dispatched(&self) -> Vec<VerificationRequest> {
        self.dispatched
            .lock()
            .expect("verification mutex poisoned")
            .clone()
    }

    pub fn id_for(&self, role: PartyRole) -> Option<VerificationId> {
        self.dispatched()
            .into_iter()
            .rev()
            .find(|request| request.role == role)
            .map(|request| request.id)
    }
}

impl IncomeVerificationResponder for InMemoryVerificationResponder {
    fn allocate(
        &self,
        _assessment_id: AssessmentId,
        _role: PartyRole,
    ) -> Result<VerificationId, GatewayError> {
        Ok(VerificationId(self.sequence.fetch_add(1, Ordering::Relaxed) + 1))
    }

    fn dispatch(
        &self,
        _application_id: ApplicationId,
        request: &VerificationRequest,
    ) -> Result<(), GatewayError> {
        ensure_available(&self.unavailable, request.role)?;
        self.dispatched
            .lock()
            .expect("verification mutex poisoned")
            .push(*request);
        Ok(())
    }
}

fn toggle(roles: &Mutex<HashSet<PartyRole>>, role: PartyRole, unavailable: bool) {
    let mut roles = roles.lock().expect("availability mutex poisoned");
    if unavailable {
        roles.insert(role);
    } else {
        roles.remove(&role);
    }
}

fn ensure_available(roles: &Mutex<HashSet<PartyRole>>, role: PartyRole) -> Result<(), GatewayError> {
    if roles.lock().expect("availability mutex poisoned").contains(&role) {
        return Err(GatewayError::Unavailable(format!("{} endpoint down", role.label())));
    }
    Ok(())
}

#[derive(Default)]
pub struct InMemoryInstanceStore {
    instances: RwLock<HashMap<AssessmentId, ProcessInstance>>,
}

impl InstanceStore for InMemoryInstanceStore {
    fn save(&self, instance: &ProcessInstance) -> Result<(), GatewayError> {
        let mut instances = self.instances.write().expect("instance store lock poisoned");
        instances.insert(instance.assessment_id(), instance.clone());
        Ok(())
    }

    fn load(&self, assessment_id: AssessmentId) -> Result<Option<ProcessInstance>, GatewayError> {
        let instances = self.instances.read().expect("instance store lock poisoned");
        Ok(instances.get(&assessment_id).cloned())
    }

    fn list(&self) -> Result<Vec<ProcessInstance>, GatewayError> {
        let instances = self.instances.read().expect("instance store lock poisoned");
        let mut all: Vec<ProcessInstance> = instances.values().cloned().collect();
        all.sort_by_key(ProcessInstance::assessment_id);
        Ok(all)
    }
}

/// One of each in-memory adapter, kept as concrete handles for inspection.
#[derive(Clone, Default)]
pub struct InMemoryAdapters {
    pub gateway: Arc<InMemoryAssessmentGateway>,
    pub supporting_users: Arc<InMemorySupportingUsers>,
    pub verifications: Arc<InMemoryVerificationResponder>,
    pub store: Arc<InMemoryInstanceStore>,
}

impl InMemoryAdapters {
    pub fn ports(&self, clock: Arc<dyn Clock>) -> AssessmentPorts {
        AssessmentPorts {
            gateway: self.gateway.clone(),
            supporting_users: self.supporting_users.clone(),
            verifications: self.verifications.clone(),
            store: self.store.clone(),
            clock,
        }
    }
}
