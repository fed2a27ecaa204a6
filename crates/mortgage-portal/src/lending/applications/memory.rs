use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use super::domain::{Application, ApplicationId, ApplicationStatus, Decision};
use super::repository::{ApplicationRepository, RepositoryError};

/// Process-local store backing the server, demo, and tests.
///
/// A single write lock covers the application and decision maps, which makes
/// every guarded operation atomic with respect to the others.
#[derive(Debug, Default)]
pub struct InMemoryApplicationRepository {
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    next_sequence: u64,
    sequence_by_id: HashMap<ApplicationId, u64>,
    applications: BTreeMap<u64, Application>,
    decisions: HashMap<ApplicationId, Decision>,
}

impl StoreState {
    fn pending_mut(&mut self, id: &ApplicationId) -> Result<&mut Application, RepositoryError> {
        let sequence = self
            .sequence_by_id
            .get(id)
            .copied()
            .ok_or(RepositoryError::NotFound)?;
        let application = self
            .applications
            .get_mut(&sequence)
            .ok_or(RepositoryError::NotFound)?;

        if application.status != ApplicationStatus::Pending {
            return Err(RepositoryError::NotPending);
        }
        Ok(application)
    }
}

impl InMemoryApplicationRepository {
    pub fn len(&self) -> usize {
        self.state.read().applications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn decision_count(&self) -> usize {
        self.state.read().decisions.len()
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut state = self.state.write();
        if state.sequence_by_id.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.sequence_by_id.insert(application.id, sequence);
        state.applications.insert(sequence, application.clone());
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .sequence_by_id
            .get(id)
            .and_then(|sequence| state.applications.get(sequence))
            .cloned())
    }

    fn find(
        &self,
        predicate: &dyn Fn(&Application) -> bool,
    ) -> Result<Vec<Application>, RepositoryError> {
        let state = self.state.read();
        Ok(state
            .applications
            .values()
            .filter(|application| predicate(application))
            .cloned()
            .collect())
    }

    fn update_pending(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut state = self.state.write();
        let stored = state.pending_mut(&application.id)?;
        if application.status != ApplicationStatus::Pending {
            // status only moves through record_decision
            return Err(RepositoryError::NotPending);
        }
        *stored = application.clone();
        Ok(application)
    }

    fn remove_pending(&self, id: &ApplicationId) -> Result<Application, RepositoryError> {
        let mut state = self.state.write();
        state.pending_mut(id)?;

        let sequence = state
            .sequence_by_id
            .remove(id)
            .ok_or(RepositoryError::NotFound)?;
        state
            .applications
            .remove(&sequence)
            .ok_or(RepositoryError::NotFound)
    }

    fn record_decision(&self, decision: Decision) -> Result<Application, RepositoryError> {
        let mut state = self.state.write();
        if state.decisions.contains_key(&decision.application_id) {
            return Err(RepositoryError::NotPending);
        }

        let application = state.pending_mut(&decision.application_id)?;
        application.status = decision.outcome.resulting_status();
        application.updated_at = decision.decided_at;
        let decided = application.clone();

        state.decisions.insert(decision.application_id, decision);
        Ok(decided)
    }

    fn decision_for(&self, id: &ApplicationId) -> Result<Option<Decision>, RepositoryError> {
        Ok(self.state.read().decisions.get(id).cloned())
    }
}
