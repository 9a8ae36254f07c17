//! The write contract: create, update and delete moments.
//!
//! Every call resolves to a [`WriteOutcome`]; domain failures never escape as
//! `Err`. Validation always finishes before the first statement is issued.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    capture_now,
    locate::Placement,
    validation::{
        validate_write, ValidationFailure, ValidationReport, DESTINATION_TAKEN, DUPLICATE_NAME,
    },
    MomentsService,
};
use crate::{
    db::{
        helpers::constraint_violation,
        models::{MomentRecord, StepRecord},
    },
    error::MomentsError,
    log_debug, log_error, log_info, log_warn,
    temporal::derive_schedule,
};

const ENABLE_LOGS: bool = true;

const REFERENTIAL_MESSAGE: &str = "This moment could not be found. It may have been deleted.";
const CONSISTENCY_MESSAGE: &str = "A moment needs at least one step with consecutive numbering.";
const INTERNAL_MESSAGE: &str = "Something went wrong on our side. Your entries were kept; please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteVariant {
    Creating,
    Updating,
}

/// Caller-editable moment fields. Derived values are not accepted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentFields {
    pub activity: String,
    pub name: String,
    #[serde(default)]
    pub is_indispensable: bool,
    #[serde(default)]
    pub description: String,
    pub start_date_and_time: DateTime<Utc>,
    pub destination_name: String,
}

impl MomentFields {
    fn normalized(&self) -> Self {
        Self {
            activity: self.activity.trim().to_string(),
            name: self.name.trim().to_string(),
            is_indispensable: self.is_indispensable,
            description: self.description.clone(),
            start_date_and_time: self.start_date_and_time,
            destination_name: self.destination_name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInput {
    pub order_id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Minutes.
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub variant: WriteVariant,
    pub fields: MomentFields,
    pub steps: Vec<StepInput>,
    #[serde(default)]
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Referential,
    Consistency,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSuccess {
    pub moment_id: String,
    /// Where the written moment now lives; absent after a delete or when it
    /// could not be located once saved.
    pub placement: Option<Placement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WriteOutcome {
    Success(WriteSuccess),
    ValidationError(ValidationFailure),
    Failure(WriteFailure),
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Success(_))
    }

    pub fn moment_id(&self) -> Option<&str> {
        match self {
            WriteOutcome::Success(success) => Some(&success.moment_id),
            _ => None,
        }
    }
}

/// Builds the row set to persist, deriving every start/end from the moment
/// start and the ordered durations.
fn build_record(
    moment_id: String,
    user_id: &str,
    fields: &MomentFields,
    steps: &[StepInput],
) -> Result<MomentRecord, MomentsError> {
    let schedule = derive_schedule(fields.start_date_and_time, steps.iter().map(|s| s.duration))?;

    let step_records = steps
        .iter()
        .zip(&schedule.steps)
        .map(|(step, interval)| StepRecord {
            id: Uuid::new_v4().to_string(),
            order_id: step.order_id,
            name: step.name.trim().to_string(),
            description: step.description.clone(),
            start_date_and_time: interval.start,
            duration: step.duration,
            end_date_and_time: interval.end,
        })
        .collect();

    Ok(MomentRecord {
        id: moment_id,
        user_id: user_id.to_string(),
        destination_name: fields.destination_name.clone(),
        activity: fields.activity.clone(),
        name: fields.name.clone(),
        is_indispensable: fields.is_indispensable,
        description: fields.description.clone(),
        start_date_and_time: fields.start_date_and_time,
        duration: schedule.moment_duration,
        end_date_and_time: schedule.moment_end,
        steps: step_records,
    })
}

/// Form field behind a store constraint, for the uniques the pre-write checks
/// can lose a race on.
fn constraint_field(message: &str) -> Option<&'static str> {
    if message.contains("moments.name") {
        Some("name")
    } else if message.contains("destinations.name") {
        Some("destinationName")
    } else {
        None
    }
}

fn constraint_failure(field: &str) -> WriteOutcome {
    let message = match field {
        "destinationName" => DESTINATION_TAKEN,
        _ => DUPLICATE_NAME,
    };
    let mut report = ValidationReport::default();
    report.moment_error(field, message);
    match report.into_failure() {
        Some(failure) => WriteOutcome::ValidationError(failure),
        None => WriteOutcome::Failure(WriteFailure {
            kind: FailureKind::Internal,
            message: INTERNAL_MESSAGE.into(),
        }),
    }
}

/// Maps an error that reached the contract boundary to a user-safe outcome.
fn failure_outcome(action: &str, err: anyhow::Error) -> WriteOutcome {
    let domain = err.downcast_ref::<MomentsError>();

    let kind = match domain {
        Some(domain) if domain.is_referential() => {
            log_warn!("Failed to {action}: {err}");
            FailureKind::Referential
        }
        Some(domain) if domain.is_consistency() => {
            log_warn!("Rejected {action}: {err}");
            FailureKind::Consistency
        }
        _ => {
            log_error!("Failed to {action}: {err:#}");
            FailureKind::Internal
        }
    };

    let message = match kind {
        FailureKind::Referential => REFERENTIAL_MESSAGE,
        FailureKind::Consistency => CONSISTENCY_MESSAGE,
        FailureKind::Internal => INTERNAL_MESSAGE,
    };

    WriteOutcome::Failure(WriteFailure {
        kind,
        message: message.into(),
    })
}

impl MomentsService {
    /// Creates or updates a moment with its full, ordered step list.
    ///
    /// The request is borrowed so the caller keeps every entered value when
    /// the outcome is a validation error.
    pub async fn write_moment(&self, user_id: &str, request: &WriteRequest) -> WriteOutcome {
        let action = match request.variant {
            WriteVariant::Creating => "create moment",
            WriteVariant::Updating => "update moment",
        };

        match self.try_write_moment(user_id, request).await {
            Ok(outcome) => outcome,
            Err(err) => match constraint_violation(&err).and_then(constraint_field) {
                Some(field) => {
                    log_debug!("Store rejected {action} on the {field} constraint: {err:#}");
                    constraint_failure(field)
                }
                None => failure_outcome(action, err),
            },
        }
    }

    async fn try_write_moment(&self, user_id: &str, request: &WriteRequest) -> Result<WriteOutcome> {
        let target_id = match request.variant {
            WriteVariant::Creating => None,
            WriteVariant::Updating => Some(
                request
                    .target_id
                    .as_deref()
                    .ok_or_else(|| MomentsError::moment_not_found("<missing target id>"))?,
            ),
        };

        let fields = request.fields.normalized();
        let mut report = validate_write(&fields, &request.steps);
        if !report.has_moment_error("name")
            && self
                .db()
                .moment_name_taken(user_id, &fields.name, target_id)
                .await?
        {
            report.moment_error("name", DUPLICATE_NAME);
        }

        if let Some(failure) = report.into_failure() {
            log_debug!("Rejected moment write for user {user_id}: {failure:?}");
            return Ok(WriteOutcome::ValidationError(failure));
        }

        let moment_id = target_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let record = build_record(moment_id.clone(), user_id, &fields, &request.steps)?;

        match request.variant {
            WriteVariant::Creating => self.db().create_moment(record).await?,
            WriteVariant::Updating => self.db().update_moment(record).await?,
        }

        let verb = match request.variant {
            WriteVariant::Creating => "Created",
            WriteVariant::Updating => "Updated",
        };
        let placement = self.placement_after_commit(user_id, &moment_id).await;
        match &placement {
            Some(placement) => log_info!(
                "{verb} moment {moment_id}, now on {} page {}",
                placement.partition,
                placement.page
            ),
            None => log_info!("{verb} moment {moment_id}"),
        }

        Ok(WriteOutcome::Success(WriteSuccess {
            moment_id,
            placement,
        }))
    }

    /// Where a just-committed moment landed. The write already happened, so a
    /// failed lookup only costs the placement.
    async fn placement_after_commit(&self, user_id: &str, moment_id: &str) -> Option<Placement> {
        let moment = match self.db().get_moment(user_id, moment_id).await {
            Ok(Some(moment)) => moment,
            Ok(None) => {
                log_warn!("Moment {moment_id} vanished right after it was saved");
                return None;
            }
            Err(err) => {
                log_warn!("Saved moment {moment_id} but could not read it back: {err:#}");
                return None;
            }
        };

        match self.placement(user_id, &moment, capture_now()).await {
            Ok(placement) => Some(placement),
            Err(err) => {
                log_warn!("Saved moment {moment_id} but could not locate its page: {err:#}");
                None
            }
        }
    }

    /// Deletes a moment and, through the cascade, its steps.
    pub async fn delete_moment(&self, user_id: &str, moment_id: &str) -> WriteOutcome {
        match self.db().delete_moment(user_id, moment_id).await {
            Ok(()) => {
                log_info!("Deleted moment {moment_id}");
                WriteOutcome::Success(WriteSuccess {
                    moment_id: moment_id.to_string(),
                    placement: None,
                })
            }
            Err(err) => failure_outcome("delete moment", err),
        }
    }
}
