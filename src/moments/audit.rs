//! Consistency checks over stored moments.
//!
//! A moment whose step list is gone, gapped, or out of step with its stored
//! derived times is reported here instead of being silently read as a
//! zero-length moment.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::MomentsService;
use crate::{
    db::models::Moment,
    error::MomentsError,
    log_info, log_warn,
    temporal::derive_schedule,
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "camelCase")]
pub enum MomentIssue {
    NoSteps,
    #[serde(rename_all = "camelCase")]
    OrderGap { order_ids: Vec<u32> },
    /// A stored value no longer matches what the steps derive to.
    #[serde(rename_all = "camelCase")]
    DerivedMismatch {
        field: String,
        stored: String,
        derived: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentAudit {
    pub moment_id: String,
    pub name: String,
    pub issues: Vec<MomentIssue>,
}

fn mismatch<T: ToString + PartialEq>(
    issues: &mut Vec<MomentIssue>,
    field: String,
    stored: T,
    derived: T,
) {
    if stored != derived {
        issues.push(MomentIssue::DerivedMismatch {
            field,
            stored: stored.to_string(),
            derived: derived.to_string(),
        });
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// Every inconsistency found on `moment`; empty when it is sound.
pub fn audit(moment: &Moment) -> Vec<MomentIssue> {
    let mut issues = Vec::new();

    if moment.steps.is_empty() {
        issues.push(MomentIssue::NoSteps);
        return issues;
    }

    let mut steps: Vec<_> = moment.steps.iter().collect();
    steps.sort_by_key(|step| step.order_id);

    let order_ids: Vec<u32> = steps.iter().map(|step| step.order_id).collect();
    let contiguous = order_ids
        .iter()
        .enumerate()
        .all(|(index, order_id)| *order_id == index as u32 + 1);
    if !contiguous {
        issues.push(MomentIssue::OrderGap {
            order_ids: order_ids.clone(),
        });
    }

    let schedule = match derive_schedule(
        moment.start_date_and_time,
        steps.iter().map(|step| step.duration),
    ) {
        Ok(schedule) => schedule,
        Err(err) => {
            issues.push(MomentIssue::DerivedMismatch {
                field: "endDateAndTime".into(),
                stored: timestamp(moment.end_date_and_time),
                derived: err.to_string(),
            });
            return issues;
        }
    };

    mismatch(
        &mut issues,
        "duration".into(),
        moment.duration,
        schedule.moment_duration,
    );
    mismatch(
        &mut issues,
        "endDateAndTime".into(),
        timestamp(moment.end_date_and_time),
        timestamp(schedule.moment_end),
    );

    for (step, interval) in steps.iter().zip(&schedule.steps) {
        mismatch(
            &mut issues,
            format!("steps[{}].startDateAndTime", step.order_id),
            timestamp(step.start_date_and_time),
            timestamp(interval.start),
        );
        mismatch(
            &mut issues,
            format!("steps[{}].endDateAndTime", step.order_id),
            timestamp(step.end_date_and_time),
            timestamp(interval.end),
        );
    }

    issues
}

/// Fails with the structural error (no steps, order gap) when there is one.
/// Derived mismatches are not structural and pass.
pub fn ensure_consistent(moment: &Moment) -> Result<(), MomentsError> {
    for issue in audit(moment) {
        match issue {
            MomentIssue::NoSteps => {
                return Err(MomentsError::NoSteps {
                    moment_id: moment.id.clone(),
                })
            }
            MomentIssue::OrderGap { order_ids } => {
                return Err(MomentsError::OrderGap {
                    moment_id: moment.id.clone(),
                    order_ids,
                })
            }
            MomentIssue::DerivedMismatch { .. } => {}
        }
    }
    Ok(())
}

impl MomentsService {
    pub async fn audit_moment(&self, user_id: &str, moment_id: &str) -> Result<MomentAudit> {
        let moment = self
            .db()
            .get_moment(user_id, moment_id)
            .await?
            .ok_or_else(|| MomentsError::moment_not_found(moment_id))?;

        Ok(MomentAudit {
            issues: audit(&moment),
            moment_id: moment.id,
            name: moment.name,
        })
    }

    /// Audits every moment of the user, returning only the unsound ones.
    pub async fn audit_user(&self, user_id: &str) -> Result<Vec<MomentAudit>> {
        let moments = self.db().list_user_moments(user_id).await?;
        let checked = moments.len();

        let findings: Vec<MomentAudit> = moments
            .into_iter()
            .filter_map(|moment| {
                let issues = audit(&moment);
                (!issues.is_empty()).then(|| MomentAudit {
                    moment_id: moment.id,
                    name: moment.name,
                    issues,
                })
            })
            .collect();

        if findings.is_empty() {
            log_info!("Audited {checked} moments for user {user_id}, all consistent");
        } else {
            log_warn!(
                "Audited {checked} moments for user {user_id}, {} inconsistent",
                findings.len()
            );
        }

        Ok(findings)
    }
}
