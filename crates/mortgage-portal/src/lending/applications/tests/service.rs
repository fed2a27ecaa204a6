use super::common::*;
use crate::lending::applications::domain::{
    ApplicationFilter, ApplicationId, ApplicationStatus, DecisionOutcome, DecisionRequest,
};
use crate::lending::applications::repository::RepositoryError;
use crate::lending::applications::ApplicationServiceError;
use crate::lending::events::Operation;
use chrono::Duration;

#[test]
fn create_stores_pending_application_owned_by_caller() {
    let h = harness();

    let created = h
        .lifecycle
        .create(terms(300_000, 360), &applicant_a())
        .expect("applicant can submit");

    assert_eq!(created.status, ApplicationStatus::Pending);
    assert_eq!(created.owner_id, applicant_a().id);
    assert_eq!(created.owner_national_id.as_deref(), Some("NID-A"));
    assert_eq!(created.created_at, created.updated_at);
    assert_eq!(h.repository.len(), 1);

    let events = h.events.events();
    assert_eq!(h.events.operations(), vec![Operation::Create]);
    assert_eq!(events[0].metadata.event_type, "APPLICATION_CREATE");
    assert_eq!(events[0].application.id, created.id);
    assert_eq!(
        h.events.keys(),
        vec![(TOPIC.to_string(), created.id.to_string())]
    );
}

#[test]
fn officers_cannot_submit() {
    let h = harness();

    match h.lifecycle.create(terms(300_000, 360), &officer()) {
        Err(ApplicationServiceError::AccessDenied(_)) => {}
        other => panic!("expected access denied, got {other:?}"),
    }
    assert!(h.repository.is_empty());
    assert!(h.events.events().is_empty());
}

#[test]
fn invalid_terms_are_rejected_before_storage() {
    let h = harness();

    match h.lifecycle.create(terms(0, 360), &applicant_a()) {
        Err(ApplicationServiceError::Validation { field, .. }) => assert_eq!(field, "amount"),
        other => panic!("expected validation error, got {other:?}"),
    }
    match h.lifecycle.create(terms(10_000, 481), &applicant_a()) {
        Err(ApplicationServiceError::Validation { field, .. }) => assert_eq!(field, "termMonths"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(h.repository.is_empty());
    assert!(h.events.events().is_empty());
}

#[test]
fn reads_are_limited_to_owner_and_officers() {
    let h = harness();
    let created = h
        .lifecycle
        .create(terms(150_000, 180), &applicant_a())
        .expect("submit");

    assert_eq!(
        h.lifecycle.get(&created.id, &applicant_a()).expect("owner reads"),
        created
    );
    assert_eq!(
        h.lifecycle.get(&created.id, &officer()).expect("officer reads"),
        created
    );
    assert!(matches!(
        h.lifecycle.get(&created.id, &applicant_b()),
        Err(ApplicationServiceError::AccessDenied(_))
    ));
}

#[test]
fn missing_application_is_not_found_for_every_role() {
    let h = harness();
    let id = ApplicationId::generate();

    for principal in [applicant_a(), officer()] {
        match h.lifecycle.get(&id, &principal) {
            Err(ApplicationServiceError::NotFound(missing)) => assert_eq!(missing, id),
            other => panic!("expected not found, got {other:?}"),
        }
    }
}

#[test]
fn applicant_listing_only_shows_own_applications() {
    let h = harness();
    let mine = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");
    h.lifecycle
        .create(terms(200_000, 240), &applicant_b())
        .expect("submit");

    let listed = h
        .lifecycle
        .list(&ApplicationFilter::default(), &applicant_a())
        .expect("list");
    assert_eq!(listed, vec![mine]);

    let everything = h
        .lifecycle
        .list(&ApplicationFilter::default(), &officer())
        .expect("list");
    assert_eq!(everything.len(), 2);
}

#[test]
fn officer_filters_combine() {
    let h = harness();
    let first = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");
    let second = h
        .lifecycle
        .create(terms(200_000, 240), &applicant_a())
        .expect("submit");
    let other = h
        .lifecycle
        .create(terms(300_000, 360), &applicant_b())
        .expect("submit");
    h.decisions
        .decide(
            &second.id,
            DecisionRequest::new(DecisionOutcome::Approved, "income verified"),
            &officer(),
        )
        .expect("decide");

    let approved = h
        .lifecycle
        .list(&ApplicationFilter::with_status(ApplicationStatus::Approved), &officer())
        .expect("list");
    assert_eq!(
        approved.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![second.id]
    );

    let by_national_id = ApplicationFilter {
        national_id: Some("NID-B".to_string()),
        ..ApplicationFilter::default()
    };
    let listed = h.lifecycle.list(&by_national_id, &officer()).expect("list");
    assert_eq!(listed, vec![other.clone()]);

    let exclusive_window = ApplicationFilter {
        created_from: Some(first.created_at),
        created_to: Some(other.created_at),
        ..ApplicationFilter::default()
    };
    let listed = h
        .lifecycle
        .list(&exclusive_window, &officer())
        .expect("list");
    assert!(listed.iter().all(|a| a.id == second.id));

    let widened_window = ApplicationFilter {
        status: Some(ApplicationStatus::Pending),
        created_from: Some(first.created_at - Duration::milliseconds(1)),
        created_to: Some(other.created_at + Duration::milliseconds(1)),
        ..ApplicationFilter::default()
    };
    let listed = h
        .lifecycle
        .list(&widened_window, &officer())
        .expect("list");
    assert_eq!(
        listed.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![first.id, other.id]
    );

    let future_window = ApplicationFilter {
        created_from: Some(other.created_at + Duration::seconds(1)),
        ..ApplicationFilter::default()
    };
    assert!(h
        .lifecycle
        .list(&future_window, &officer())
        .expect("list")
        .is_empty());
}

#[test]
fn creation_instant_is_outside_both_bounds() {
    let h = harness();
    let created = h
        .lifecycle
        .create(terms(150_000, 180), &applicant_a())
        .expect("submit");

    let pinned = ApplicationFilter {
        created_from: Some(created.created_at),
        created_to: Some(created.created_at),
        ..ApplicationFilter::default()
    };
    assert!(h.lifecycle.list(&pinned, &officer()).expect("list").is_empty());

    let from_only = ApplicationFilter {
        created_from: Some(created.created_at),
        ..ApplicationFilter::default()
    };
    assert!(h.lifecycle.list(&from_only, &officer()).expect("list").is_empty());

    let to_only = ApplicationFilter {
        created_to: Some(created.created_at),
        ..ApplicationFilter::default()
    };
    assert!(h.lifecycle.list(&to_only, &officer()).expect("list").is_empty());

    let straddling = ApplicationFilter {
        created_from: Some(created.created_at - Duration::seconds(1)),
        created_to: Some(created.created_at + Duration::seconds(1)),
        ..ApplicationFilter::default()
    };
    assert_eq!(
        h.lifecycle.list(&straddling, &officer()).expect("list"),
        vec![created]
    );
}

#[test]
fn owner_updates_pending_terms() {
    let h = harness();
    let created = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");

    let updated = h
        .lifecycle
        .update(&created.id, terms(125_000, 180), &applicant_a())
        .expect("owner updates");

    assert_eq!(updated.amount, 125_000);
    assert_eq!(updated.term_months, 180);
    assert_eq!(updated.status, ApplicationStatus::Pending);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(
        h.events.operations(),
        vec![Operation::Create, Operation::Update]
    );
}

#[test]
fn only_the_owner_may_update() {
    let h = harness();
    let created = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");

    assert!(matches!(
        h.lifecycle
            .update(&created.id, terms(1, 1), &applicant_b()),
        Err(ApplicationServiceError::AccessDenied(_))
    ));
    assert!(matches!(
        h.lifecycle.update(&created.id, terms(1, 1), &officer()),
        Err(ApplicationServiceError::AccessDenied(_))
    ));
    assert_eq!(h.events.operations(), vec![Operation::Create]);
}

#[test]
fn decided_applications_are_frozen() {
    let h = harness();
    let created = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");
    h.decisions
        .decide(
            &created.id,
            DecisionRequest::new(DecisionOutcome::Rejected, "debt ratio"),
            &officer(),
        )
        .expect("decide");

    assert!(matches!(
        h.lifecycle
            .update(&created.id, terms(90_000, 120), &applicant_a()),
        Err(ApplicationServiceError::AlreadyDecided(_))
    ));
    assert!(matches!(
        h.lifecycle.delete(&created.id, &applicant_a()),
        Err(ApplicationServiceError::AlreadyDecided(_))
    ));
    assert!(matches!(
        h.lifecycle.delete(&created.id, &officer()),
        Err(ApplicationServiceError::AlreadyDecided(_))
    ));
    assert_eq!(h.repository.len(), 1);
    assert_eq!(
        h.events.operations(),
        vec![Operation::Create, Operation::Update]
    );
}

#[test]
fn owner_and_officer_may_delete_pending() {
    let h = harness();
    let withdrawn = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");
    let discarded = h
        .lifecycle
        .create(terms(100_000, 120), &applicant_a())
        .expect("submit");

    assert!(matches!(
        h.lifecycle.delete(&withdrawn.id, &applicant_b()),
        Err(ApplicationServiceError::AccessDenied(_))
    ));
    h.lifecycle
        .delete(&withdrawn.id, &applicant_a())
        .expect("owner withdraws");
    h.lifecycle
        .delete(&discarded.id, &officer())
        .expect("officer discards");

    assert!(h.repository.is_empty());
    assert!(matches!(
        h.lifecycle.get(&withdrawn.id, &applicant_a()),
        Err(ApplicationServiceError::NotFound(_))
    ));

    let events = h.events.events();
    let deletes: Vec<_> = events
        .iter()
        .filter(|event| event.operation == Operation::Delete)
        .collect();
    assert_eq!(deletes.len(), 2);
    assert_eq!(deletes[0].metadata.event_type, "APPLICATION_DELETE");
    assert_eq!(deletes[0].application.id, withdrawn.id);
}

#[test]
fn repository_outage_surfaces_without_events() {
    let h = Harness::with_repository(UnavailableRepository);

    match h.lifecycle.create(terms(100_000, 120), &applicant_a()) {
        Err(ApplicationServiceError::Repository(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected repository error, got {other:?}"),
    }
    assert!(matches!(
        h.lifecycle.list(&ApplicationFilter::default(), &officer()),
        Err(ApplicationServiceError::Repository(_))
    ));
    assert!(h.events.events().is_empty());
}
