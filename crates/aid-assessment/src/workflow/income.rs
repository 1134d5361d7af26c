use tracing::{debug, info};

use super::domain::{
    ApplicationId, PartyRole, ProcessInstance, SupportingPartyRecord, VerificationRequest,
    VerificationStatus,
};
use super::ports::{GatewayError, IncomeVerificationResponder};
use super::waiters::WaiterTable;
use super::JoinState;

/// Roles that need their income verified: the student always, the partner when the
/// student is married, and every identified parent able to report.
pub fn verification_roles(partner: bool, supporting: &[SupportingPartyRecord]) -> Vec<PartyRole> {
    let mut roles = vec![PartyRole::Student];
    if partner {
        roles.push(PartyRole::Partner);
    }
    roles.extend(
        supporting
            .iter()
            .filter(|party| party.able_to_report)
            .map(|party| party.role),
    );
    roles
}

/// Fans out one verification branch per role and joins once every branch resolves.
///
/// A role that already holds a request is never allocated again, so re-entering the
/// join after a restart only re-arms the waiters.
pub struct IncomeVerificationCoordinator<'a> {
    responder: &'a dyn IncomeVerificationResponder,
}

impl<'a> IncomeVerificationCoordinator<'a> {
    pub fn new(responder: &'a dyn IncomeVerificationResponder) -> Self {
        Self { responder }
    }

    pub fn join(
        &self,
        instance: &mut ProcessInstance,
        application_id: ApplicationId,
        waiters: &mut WaiterTable,
    ) -> Result<JoinState, GatewayError> {
        let assessment_id = instance.assessment_id();
        let roles = verification_roles(instance.parties.partner, &instance.supporting_parties);

        for role in roles {
            if instance
                .verifications
                .iter()
                .any(|request| request.role == role)
            {
                continue;
            }
            let id = self.responder.allocate(assessment_id, role)?;
            let request = VerificationRequest {
                id,
                role,
                status: VerificationStatus::Pending,
            };
            self.responder.dispatch(application_id, &request)?;
            info!(%assessment_id, verification_id = %id, role = role.label(), "income verification requested");
            instance.verifications.push(request);
        }

        let pending: Vec<_> = instance
            .verifications
            .iter()
            .filter(|request| request.status == VerificationStatus::Pending)
            .map(VerificationRequest::correlation)
            .collect();
        for message in &pending {
            waiters.register(*message, assessment_id);
            instance.wait_on(*message);
        }

        if pending.is_empty() {
            Ok(JoinState::Ready)
        } else {
            debug!(%assessment_id, pending = pending.len(), "waiting on income verifications");
            Ok(JoinState::Waiting)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::domain::{SupportingPartyStatus, SupportingUserId};

    fn parent(id: u64, role: PartyRole) -> SupportingPartyRecord {
        SupportingPartyRecord {
            id: SupportingUserId(id),
            role,
            able_to_report: true,
            status: SupportingPartyStatus::InfoReceived,
        }
    }

    #[test]
    fn single_independent_student_verifies_alone() {
        assert_eq!(verification_roles(false, &[]), vec![PartyRole::Student]);
    }

    #[test]
    fn married_dependant_fans_out_to_every_party() {
        let parents = [parent(1, PartyRole::Parent1), parent(2, PartyRole::Parent2)];
        assert_eq!(
            verification_roles(true, &parents),
            vec![
                PartyRole::Student,
                PartyRole::Partner,
                PartyRole::Parent1,
                PartyRole::Parent2
            ]
        );
    }
}
