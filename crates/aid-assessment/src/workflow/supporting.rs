use tracing::{debug, info};

use crate::calculator::ConsolidatedAssessmentInput;

use super::domain::{
    ApplicationId, PartyRole, ProcessInstance, SupportingPartyRecord, SupportingPartyStatus,
};
use super::ports::{GatewayError, SupportingUserGateway};
use super::waiters::WaiterTable;
use super::JoinState;

/// Parents that can be asked to supply their information, in parent order.
///
/// Independent students have none. Parents flagged unable to report are skipped, and a
/// step-parent waiver limits the search to parent 1.
pub fn identifiable_parents(input: &ConsolidatedAssessmentInput) -> Vec<PartyRole> {
    if !input.student.is_dependant() {
        return Vec::new();
    }
    let limit = if input.step_parent_waiver { 1 } else { 2 };
    input
        .parents
        .iter()
        .zip([PartyRole::Parent1, PartyRole::Parent2])
        .take(limit)
        .filter(|(parent, _)| parent.able_to_report)
        .map(|(_, role)| role)
        .collect()
}

/// Creates one supporting user per identifiable parent and joins on their
/// `supporting-user-info-received` messages.
pub struct SupportingPartyCoordinator<'a> {
    gateway: &'a dyn SupportingUserGateway,
}

impl<'a> SupportingPartyCoordinator<'a> {
    pub fn new(gateway: &'a dyn SupportingUserGateway) -> Self {
        Self { gateway }
    }

    pub fn identify(
        &self,
        instance: &mut ProcessInstance,
        application_id: ApplicationId,
        waiters: &mut WaiterTable,
    ) -> Result<JoinState, GatewayError> {
        let assessment_id = instance.assessment_id();
        let roles = instance.parties.parents.clone();

        for role in roles {
            if instance
                .supporting_parties
                .iter()
                .any(|party| party.role == role)
            {
                continue;
            }
            let id = self.gateway.create_supporting_user(application_id, role)?;
            let record = SupportingPartyRecord {
                id,
                role,
                able_to_report: true,
                status: SupportingPartyStatus::AwaitingInfo,
            };
            info!(%assessment_id, supporting_user_id = %id, role = role.label(), "supporting user created");
            instance.supporting_parties.push(record);
        }

        let pending: Vec<_> = instance
            .supporting_parties
            .iter()
            .filter(|party| party.status == SupportingPartyStatus::AwaitingInfo)
            .map(SupportingPartyRecord::correlation)
            .collect();
        for message in &pending {
            waiters.register(*message, assessment_id);
            instance.wait_on(*message);
        }

        if pending.is_empty() {
            Ok(JoinState::Ready)
        } else {
            debug!(%assessment_id, pending = pending.len(), "waiting on supporting users");
            Ok(JoinState::Waiting)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::input::{DependencyStatus, ParentFacts};
    use crate::calculator::test_support::independent_input;

    fn parent(able_to_report: bool) -> ParentFacts {
        ParentFacts {
            able_to_report,
            ..Default::default()
        }
    }

    #[test]
    fn independent_students_have_no_parents_to_identify() {
        let mut input = independent_input();
        input.parents = vec![parent(true), parent(true)];
        assert!(identifiable_parents(&input).is_empty());
    }

    #[test]
    fn parents_without_valid_sin_are_skipped() {
        let mut input = independent_input();
        input.student.dependency_status = DependencyStatus::Dependant;
        input.parents = vec![parent(false), parent(true)];
        assert_eq!(identifiable_parents(&input), vec![PartyRole::Parent2]);

        input.parents = vec![parent(false), parent(false)];
        assert!(identifiable_parents(&input).is_empty());
    }

    #[test]
    fn step_parent_waiver_identifies_parent_one_only() {
        let mut input = independent_input();
        input.student.dependency_status = DependencyStatus::Dependant;
        input.step_parent_waiver = true;
        input.parents = vec![parent(true), parent(true)];
        assert_eq!(identifiable_parents(&input), vec![PartyRole::Parent1]);
    }
}
