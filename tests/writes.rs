mod common;

use chrono::{TimeZone, Utc};
use common::{at, create_request, fields, seed, service, steps, USER};
use moments_lib::{
    db::{
        helpers::constraint_violation,
        models::{MomentRecord, StepRecord},
    },
    moments::{
        validation::DUPLICATE_NAME, EditorState, ErrorGroupKind, FailureKind, MomentIssue,
        ViewQuery, ViewSelector, WriteOutcome, WriteRequest, WriteVariant,
    },
    temporal::Partition,
};

fn expect_validation(outcome: WriteOutcome) -> moments_lib::moments::ValidationFailure {
    match outcome {
        WriteOutcome::ValidationError(failure) => failure,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

fn expect_failure(outcome: WriteOutcome) -> FailureKind {
    match outcome {
        WriteOutcome::Failure(failure) => failure.kind,
        other => panic!("expected a failure, got {other:?}"),
    }
}

fn update_request(target_id: &str, name: &str, durations: &[u32]) -> WriteRequest {
    WriteRequest {
        variant: WriteVariant::Updating,
        fields: fields(name, at(10, 0)),
        steps: steps(durations),
        target_id: Some(target_id.to_string()),
    }
}

#[tokio::test]
async fn create_reports_placement_of_new_moment() {
    let service = service(5);
    let start = Utc.with_ymd_and_hms(2100, 1, 1, 8, 0, 0).unwrap();

    let outcome = service
        .write_moment(USER, &create_request("Far ahead", start, &[10]))
        .await;

    match outcome {
        WriteOutcome::Success(success) => {
            let placement = success.placement.expect("placement after create");
            assert_eq!(placement.partition, Partition::Future);
            assert_eq!(placement.page, 1);
            assert_eq!(placement.all_page, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn update_replaces_steps_and_recomputes_times() {
    let service = service(5);
    let id = seed(&service, USER, "Morning run", at(10, 0), &[10, 20]).await;

    let outcome = service
        .write_moment(USER, &update_request(&id, "Morning run", &[15, 15, 30]))
        .await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.moment_id(), Some(id.as_str()));

    let moment = service.db().get_moment(USER, &id).await.unwrap().unwrap();
    assert_eq!(moment.steps.len(), 3);
    assert_eq!(moment.duration, 60);
    assert_eq!(moment.end_date_and_time, at(11, 0));
    assert_eq!(moment.steps[2].start_date_and_time, at(10, 30));
}

#[tokio::test]
async fn duplicate_names_are_a_field_error() {
    let service = service(5);
    seed(&service, USER, "Run", at(10, 0), &[10]).await;
    let other = seed(&service, USER, "Swim", at(12, 0), &[10]).await;

    let failure = expect_validation(
        service
            .write_moment(USER, &create_request("Run", at(14, 0), &[10]))
            .await,
    );
    let moment_errors = failure.moment_errors.expect("moment errors");
    assert_eq!(moment_errors.fields["name"], vec![DUPLICATE_NAME.to_string()]);
    assert!(failure.step_errors.is_none());

    let rename = service
        .write_moment(USER, &update_request(&other, "Run", &[10]))
        .await;
    expect_validation(rename);

    // Keeping its own name is not a collision.
    let keep = service
        .write_moment(USER, &update_request(&other, "Swim", &[20]))
        .await;
    assert!(keep.is_success(), "{keep:?}");
}

#[tokio::test]
async fn invalid_moment_and_steps_report_both_groups() {
    let service = service(5);
    let mut request = create_request("  ", at(10, 0), &[10, 3]);
    request.steps[0].name = String::new();

    let failure = expect_validation(service.write_moment(USER, &request).await);

    assert_eq!(failure.focus(), Some(ErrorGroupKind::Moment));
    let moment_errors = failure.moment_errors.clone().expect("moment errors");
    let step_errors = failure.step_errors.clone().expect("step errors");
    assert!(moment_errors.priority);
    assert!(!step_errors.priority);
    assert!(moment_errors.fields.contains_key("name"));
    assert!(step_errors.fields.contains_key("steps[1].name"));
    assert!(step_errors.fields.contains_key("steps[2].duration"));

    let json = serde_json::to_value(WriteOutcome::ValidationError(failure)).unwrap();
    assert_eq!(json["status"], "validationError");
    assert_eq!(json["focus"], "moment");

    assert!(service.db().list_user_moments(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn a_moment_without_steps_is_never_written() {
    let service = service(5);
    let request = create_request("Empty", at(10, 0), &[]);

    let failure = expect_validation(service.write_moment(USER, &request).await);
    assert_eq!(failure.focus(), Some(ErrorGroupKind::Steps));
    assert!(failure.step_errors.unwrap().fields.contains_key("steps"));
    assert!(service.db().list_user_moments(USER).await.unwrap().is_empty());
}

async fn moment_count(service: &moments_lib::moments::MomentsService) -> i64 {
    service
        .db()
        .execute(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM moments", [], |row| row.get(0))?)
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn starts_outside_four_digit_years_are_rejected_before_writing() {
    let service = service(5);
    seed(&service, USER, "Kept", at(10, 0), &[10]).await;

    let far = Utc.with_ymd_and_hms(10000, 1, 1, 8, 0, 0).unwrap();
    let failure = expect_validation(
        service
            .write_moment(USER, &create_request("Far", far, &[10]))
            .await,
    );
    assert!(failure
        .moment_errors
        .as_ref()
        .unwrap()
        .fields
        .contains_key("startDateAndTime"));

    let edge = Utc.with_ymd_and_hms(9999, 12, 31, 23, 50, 0).unwrap();
    let failure = expect_validation(
        service
            .write_moment(USER, &create_request("Edge", edge, &[30]))
            .await,
    );
    assert!(failure
        .moment_errors
        .unwrap()
        .fields
        .contains_key("startDateAndTime"));

    // Near the limit of the date type the checked derivation still answers.
    let limit = chrono::DateTime::<Utc>::MAX_UTC - chrono::Duration::minutes(1);
    expect_validation(
        service
            .write_moment(USER, &create_request("Limit", limit, &[1440]))
            .await,
    );

    assert_eq!(moment_count(&service).await, 1);
    let view = service
        .read_moments_at(USER, &ViewQuery::default(), at(9, 0))
        .await
        .unwrap();
    assert_eq!(view.all.page.total_count, 1);
    assert!(service.audit_user(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn committed_write_succeeds_even_if_reading_it_back_fails() {
    let service = service(5);
    service
        .db()
        .execute(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER spoil_created_at AFTER INSERT ON moments
                 BEGIN
                     UPDATE moments SET created_at = 'not a timestamp' WHERE id = NEW.id;
                 END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let outcome = service
        .write_moment(USER, &create_request("Run", at(10, 0), &[10]))
        .await;

    match outcome {
        WriteOutcome::Success(success) => {
            assert!(success.placement.is_none());
            assert!(!success.moment_id.is_empty());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(moment_count(&service).await, 1);
}

#[tokio::test]
async fn updating_a_missing_moment_is_referential() {
    let service = service(5);

    let missing = service
        .write_moment(USER, &update_request("missing", "Ghost", &[10]))
        .await;
    assert_eq!(expect_failure(missing), FailureKind::Referential);

    let mut untargeted = update_request("ignored", "Ghost", &[10]);
    untargeted.target_id = None;
    let outcome = service.write_moment(USER, &untargeted).await;
    assert_eq!(expect_failure(outcome), FailureKind::Referential);

    // Another user's moment is just as missing.
    let theirs = seed(&service, "user-2", "Theirs", at(10, 0), &[10]).await;
    let outcome = service
        .write_moment(USER, &update_request(&theirs, "Theirs", &[10]))
        .await;
    assert_eq!(expect_failure(outcome), FailureKind::Referential);
}

#[tokio::test]
async fn delete_cascades_to_steps() {
    let service = service(5);
    let id = seed(&service, USER, "Run", at(10, 0), &[10, 20]).await;

    assert!(service.delete_moment(USER, &id).await.is_success());
    assert!(service.db().get_moment(USER, &id).await.unwrap().is_none());
    assert!(service.db().get_steps(&id).await.unwrap().is_empty());

    let again = service.delete_moment(USER, &id).await;
    assert_eq!(expect_failure(again), FailureKind::Referential);
}

#[tokio::test]
async fn failed_step_recreate_rolls_back_the_whole_update() {
    let service = service(5);
    let id = seed(&service, USER, "Run", at(10, 0), &[10, 20]).await;

    let step = |id: &str| StepRecord {
        id: id.to_string(),
        order_id: 1,
        name: "Clash".into(),
        description: String::new(),
        start_date_and_time: at(10, 0),
        duration: 10,
        end_date_and_time: at(10, 10),
    };
    let record = MomentRecord {
        id: id.clone(),
        user_id: USER.into(),
        destination_name: "Park".into(),
        activity: "Sport".into(),
        name: "Renamed".into(),
        is_indispensable: false,
        description: String::new(),
        start_date_and_time: at(10, 0),
        duration: 20,
        end_date_and_time: at(10, 20),
        steps: vec![step("s-1"), step("s-2")],
    };

    let err = service.db().update_moment(record).await.unwrap_err();
    assert!(constraint_violation(&err).is_some());

    let moment = service.db().get_moment(USER, &id).await.unwrap().unwrap();
    assert_eq!(moment.name, "Run");
    assert_eq!(moment.steps.len(), 2);
    assert_eq!(moment.duration, 30);
}

#[tokio::test]
async fn lost_steps_are_flagged_by_the_audit() {
    let service = service(5);
    let broken = seed(&service, USER, "Broken", at(10, 0), &[10, 20]).await;
    seed(&service, USER, "Fine", at(12, 0), &[10]).await;

    // Fault between step delete and recreate, outside any transaction.
    let removed = service.db().delete_steps_for_moment(&broken).await.unwrap();
    assert_eq!(removed, 2);

    let audit = service.audit_moment(USER, &broken).await.unwrap();
    assert_eq!(audit.issues, vec![MomentIssue::NoSteps]);

    let findings = service.audit_user(USER).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].moment_id, broken);

    // The stored duration is kept rather than read as zero.
    let moment = service.db().get_moment(USER, &broken).await.unwrap().unwrap();
    assert_eq!(moment.duration, 30);
    assert!(moment.steps.is_empty());

    assert!(service.audit_moment(USER, "missing").await.is_err());
}

#[tokio::test]
async fn destinations_are_shared_by_name() {
    let service = service(5);
    let first = seed(&service, USER, "Run", at(10, 0), &[10]).await;
    let second = seed(&service, USER, "Walk", at(12, 0), &[10]).await;
    let mut office = create_request("Meeting", at(14, 0), &[30]);
    office.fields.destination_name = "Office".into();
    assert!(service.write_moment(USER, &office).await.is_success());

    let destinations = service.db().list_destinations(USER).await.unwrap();
    let summary: Vec<(String, u64)> = destinations
        .iter()
        .map(|d| (d.name.clone(), d.moment_count))
        .collect();
    assert_eq!(summary, vec![("Office".into(), 1), ("Park".into(), 2)]);

    let first = service.db().get_moment(USER, &first).await.unwrap().unwrap();
    let second = service.db().get_moment(USER, &second).await.unwrap().unwrap();
    assert_eq!(first.destination_id, second.destination_id);
    assert_eq!(first.destination_name, "Park");
}

#[tokio::test]
async fn view_resolution_opens_or_falls_back() {
    let service = service(5);
    let id = seed(&service, USER, "Run", at(10, 0), &[10, 20]).await;

    let query = ViewQuery::from_pairs([
        ("view", "update"),
        ("momentId", id.as_str()),
        ("partition", "past"),
    ]);
    let state = service.resolve_view(USER, &query).await.unwrap();
    assert_eq!(state.view, ViewSelector::Update);
    assert_eq!(state.active_partition, Partition::Past);
    assert_eq!(state.editing.as_ref().map(|m| m.id.as_str()), Some(id.as_str()));
    let editor = state.editor().expect("editor for update view");
    assert_eq!(*editor.state(), EditorState::Neutral);
    assert_eq!(editor.steps().len(), 2);

    let unknown = ViewQuery::from_pairs([("view", "update"), ("momentId", "nope")]);
    let state = service.resolve_view(USER, &unknown).await.unwrap();
    assert_eq!(state.view, ViewSelector::Read);
    assert!(state.editing.is_none());
    assert!(state.editor().is_none());
    assert_eq!(state.moments.all.page.total_count, 1);

    let create = ViewQuery::from_pairs([("view", "create")]);
    let state = service.resolve_view(USER, &create).await.unwrap();
    let editor = state.editor().expect("editor for create view");
    assert_eq!(*editor.state(), EditorState::Creating);
}

#[tokio::test]
async fn editor_commit_feeds_the_write_contract() {
    let service = service(5);
    let id = seed(&service, USER, "Run", at(10, 0), &[10, 20]).await;
    let moment = service.db().get_moment(USER, &id).await.unwrap().unwrap();

    let mut editor = moments_lib::moments::StepSequenceEditor::from_moment(&moment);
    let first = editor.steps()[0].key.clone();
    editor.select(&first).unwrap();
    editor.set_form_duration(25);
    assert_eq!(editor.projected_end().unwrap(), at(10, 45));
    editor.confirm_update().unwrap();
    editor.move_step(1, 0).unwrap();

    let request = WriteRequest {
        variant: WriteVariant::Updating,
        fields: fields("Run", moment.start_date_and_time),
        steps: editor.commit().unwrap(),
        target_id: Some(id.clone()),
    };
    assert!(service.write_moment(USER, &request).await.is_success());

    let stored = service.db().get_moment(USER, &id).await.unwrap().unwrap();
    let layout: Vec<(u32, u32)> = stored.steps.iter().map(|s| (s.order_id, s.duration)).collect();
    assert_eq!(layout, vec![(1, 20), (2, 25)]);
    assert_eq!(stored.end_date_and_time, at(10, 45));

    // A moment whose steps were lost reopens in creation mode.
    service.db().delete_steps_for_moment(&id).await.unwrap();
    let emptied = service.db().get_moment(USER, &id).await.unwrap().unwrap();
    let editor = moments_lib::moments::StepSequenceEditor::from_moment(&emptied);
    assert_eq!(*editor.state(), EditorState::Creating);
}
