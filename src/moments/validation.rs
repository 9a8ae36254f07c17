//! Field-level checks run before any write touches the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::write::{MomentFields, StepInput};
use crate::temporal::{derive_schedule, is_storable};

pub const NAME_MAX_CHARS: usize = 100;
pub const ACTIVITY_MAX_CHARS: usize = 50;
pub const MOMENT_DESCRIPTION_MAX_CHARS: usize = 2000;
pub const DESTINATION_MAX_CHARS: usize = 100;
pub const STEP_NAME_MAX_CHARS: usize = 100;
pub const STEP_DESCRIPTION_MAX_CHARS: usize = 1000;
pub const STEP_MIN_MINUTES: u32 = 5;
pub const STEP_MAX_MINUTES: u32 = 1440;

pub const DUPLICATE_NAME: &str = "You already have a moment with this name.";
pub const DESTINATION_TAKEN: &str =
    "This destination was just created elsewhere. Please save again.";
const START_OUT_OF_RANGE: &str = "Start must fall between the years 1 and 9999.";
const END_OUT_OF_RANGE: &str = "The steps would end after the year 9999.";

const MOMENT_MESSAGE: &str = "The moment could not be saved.";
const MOMENT_SUB_MESSAGE: &str = "Check the highlighted moment fields.";
const STEPS_MESSAGE: &str = "The steps could not be saved.";
const STEPS_SUB_MESSAGE: &str = "Check the highlighted step fields.";

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorGroupKind {
    Moment,
    Steps,
}

/// Errors for one part of the form, keyed by field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorGroup {
    pub message: String,
    pub sub_message: String,
    pub fields: FieldErrors,
    /// Set on the group that should receive focus first.
    pub priority: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub moment_errors: Option<ErrorGroup>,
    pub step_errors: Option<ErrorGroup>,
    /// Group that receives focus; mirrors the `priority` flags.
    pub focus: Option<ErrorGroupKind>,
}

impl ValidationFailure {
    fn new(moment_errors: Option<ErrorGroup>, step_errors: Option<ErrorGroup>) -> Self {
        let mut failure = Self {
            moment_errors,
            step_errors,
            focus: None,
        };
        failure.refresh_priority();
        failure
    }

    /// Moment errors take focus; step errors only when they are alone.
    pub fn focus(&self) -> Option<ErrorGroupKind> {
        if self.moment_errors.is_some() {
            Some(ErrorGroupKind::Moment)
        } else if self.step_errors.is_some() {
            Some(ErrorGroupKind::Steps)
        } else {
            None
        }
    }

    /// Clears one group; the other keeps its messages and may gain focus.
    pub fn dismiss(&mut self, kind: ErrorGroupKind) {
        match kind {
            ErrorGroupKind::Moment => self.moment_errors = None,
            ErrorGroupKind::Steps => self.step_errors = None,
        }
        self.refresh_priority();
    }

    pub fn is_empty(&self) -> bool {
        self.moment_errors.is_none() && self.step_errors.is_none()
    }

    fn refresh_priority(&mut self) {
        let focus = self.focus();
        self.focus = focus;
        if let Some(group) = self.moment_errors.as_mut() {
            group.priority = focus == Some(ErrorGroupKind::Moment);
        }
        if let Some(group) = self.step_errors.as_mut() {
            group.priority = focus == Some(ErrorGroupKind::Steps);
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    moment: FieldErrors,
    steps: FieldErrors,
}

impl ValidationReport {
    pub fn moment_error(&mut self, field: &str, message: impl Into<String>) {
        self.moment
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn step_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.steps.entry(field.into()).or_default().push(message.into());
    }

    pub fn has_moment_error(&self, field: &str) -> bool {
        self.moment.contains_key(field)
    }

    pub fn is_clean(&self) -> bool {
        self.moment.is_empty() && self.steps.is_empty()
    }

    pub fn into_failure(self) -> Option<ValidationFailure> {
        if self.is_clean() {
            return None;
        }

        let moment_errors = (!self.moment.is_empty()).then(|| ErrorGroup {
            message: MOMENT_MESSAGE.into(),
            sub_message: MOMENT_SUB_MESSAGE.into(),
            fields: self.moment,
            priority: false,
        });
        let step_errors = (!self.steps.is_empty()).then(|| ErrorGroup {
            message: STEPS_MESSAGE.into(),
            sub_message: STEPS_SUB_MESSAGE.into(),
            fields: self.steps,
            priority: false,
        });

        Some(ValidationFailure::new(moment_errors, step_errors))
    }
}

fn check_text(
    value: &str,
    label: &str,
    required: bool,
    max_chars: usize,
) -> Option<String> {
    let length = value.chars().count();
    if required && value.trim().is_empty() {
        Some(format!("{label} is required."))
    } else if length > max_chars {
        Some(format!("{label} must be at most {max_chars} characters."))
    } else {
        None
    }
}

pub fn validate_moment_fields(fields: &MomentFields, report: &mut ValidationReport) {
    let checks = [
        ("activity", check_text(&fields.activity, "Activity", true, ACTIVITY_MAX_CHARS)),
        ("name", check_text(&fields.name, "Name", true, NAME_MAX_CHARS)),
        (
            "description",
            check_text(&fields.description, "Description", false, MOMENT_DESCRIPTION_MAX_CHARS),
        ),
        (
            "destinationName",
            check_text(&fields.destination_name, "Destination", true, DESTINATION_MAX_CHARS),
        ),
    ];

    for (field, message) in checks {
        if let Some(message) = message {
            report.moment_error(field, message);
        }
    }
}

/// Problems with a single step's values, keyed by bare field name.
pub fn step_field_errors(name: &str, description: &str, duration: u32) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Some(message) = check_text(name, "Step name", true, STEP_NAME_MAX_CHARS) {
        errors.entry("name".into()).or_default().push(message);
    }
    if let Some(message) =
        check_text(description, "Step description", false, STEP_DESCRIPTION_MAX_CHARS)
    {
        errors.entry("description".into()).or_default().push(message);
    }
    if !(STEP_MIN_MINUTES..=STEP_MAX_MINUTES).contains(&duration) {
        errors.entry("duration".into()).or_default().push(format!(
            "Duration must be between {STEP_MIN_MINUTES} and {STEP_MAX_MINUTES} minutes."
        ));
    }
    errors
}

pub fn validate_steps(steps: &[StepInput], report: &mut ValidationReport) {
    if steps.is_empty() {
        report.step_error("steps", "Add at least one step.");
        return;
    }

    let contiguous = steps
        .iter()
        .enumerate()
        .all(|(index, step)| step.order_id as usize == index + 1);
    if !contiguous {
        report.step_error(
            "steps",
            format!("Steps must be numbered 1 to {} in order.", steps.len()),
        );
    }

    for (index, step) in steps.iter().enumerate() {
        let position = index + 1;
        for (field, messages) in step_field_errors(&step.name, &step.description, step.duration) {
            for message in messages {
                report.step_error(format!("steps[{position}].{field}"), message);
            }
        }
    }
}

pub fn validate_write(fields: &MomentFields, steps: &[StepInput]) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_moment_fields(fields, &mut report);
    validate_steps(steps, &mut report);
    validate_schedule_range(fields, steps, &mut report);
    report
}

/// Start and derived end must stay in the storable years.
fn validate_schedule_range(
    fields: &MomentFields,
    steps: &[StepInput],
    report: &mut ValidationReport,
) {
    let start = fields.start_date_and_time;
    if !is_storable(start) {
        report.moment_error("startDateAndTime", START_OUT_OF_RANGE);
    } else if derive_schedule(start, steps.iter().map(|s| s.duration)).is_err() {
        report.moment_error("startDateAndTime", END_OUT_OF_RANGE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fields() -> MomentFields {
        MomentFields {
            activity: "Work".into(),
            name: "Quarterly review".into(),
            is_indispensable: false,
            description: String::new(),
            start_date_and_time: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            destination_name: "Office".into(),
        }
    }

    fn step(order_id: u32, duration: u32) -> StepInput {
        StepInput {
            order_id,
            name: format!("Step {order_id}"),
            description: String::new(),
            duration,
        }
    }

    #[test]
    fn valid_write_produces_no_failure() {
        let report = validate_write(&fields(), &[step(1, 10), step(2, 20)]);
        assert!(report.into_failure().is_none());
    }

    #[test]
    fn zero_steps_is_a_step_error() {
        let failure = validate_write(&fields(), &[]).into_failure().unwrap();
        assert!(failure.moment_errors.is_none());
        let steps = failure.step_errors.unwrap();
        assert!(steps.fields.contains_key("steps"));
        assert!(steps.priority);
    }

    #[test]
    fn durations_outside_bounds_are_rejected() {
        let failure = validate_write(&fields(), &[step(1, 4), step(2, 1441), step(3, 5)])
            .into_failure()
            .unwrap();
        let steps = failure.step_errors.unwrap().fields;
        assert!(steps.contains_key("steps[1].duration"));
        assert!(steps.contains_key("steps[2].duration"));
        assert!(!steps.contains_key("steps[3].duration"));
    }

    #[test]
    fn order_ids_must_run_from_one() {
        let failure = validate_write(&fields(), &[step(2, 10), step(3, 10)])
            .into_failure()
            .unwrap();
        assert!(failure.step_errors.unwrap().fields.contains_key("steps"));
    }

    #[test]
    fn blank_required_fields_are_moment_errors() {
        let mut input = fields();
        input.name = "   ".into();
        input.destination_name = String::new();

        let failure = validate_write(&input, &[step(1, 10)]).into_failure().unwrap();
        let moment = failure.moment_errors.unwrap();
        assert!(moment.fields.contains_key("name"));
        assert!(moment.fields.contains_key("destinationName"));
        assert!(!moment.fields.contains_key("activity"));
    }

    #[test]
    fn moment_errors_take_focus_over_step_errors() {
        let mut input = fields();
        input.activity = String::new();

        let failure = validate_write(&input, &[]).into_failure().unwrap();
        assert_eq!(failure.focus(), Some(ErrorGroupKind::Moment));
        assert!(failure.moment_errors.as_ref().unwrap().priority);
        assert!(!failure.step_errors.as_ref().unwrap().priority);
    }

    #[test]
    fn dismissing_one_group_keeps_the_other_and_moves_focus() {
        let mut input = fields();
        input.activity = String::new();
        let mut failure = validate_write(&input, &[]).into_failure().unwrap();

        failure.dismiss(ErrorGroupKind::Moment);
        assert!(failure.moment_errors.is_none());
        assert_eq!(failure.focus(), Some(ErrorGroupKind::Steps));
        assert!(failure.step_errors.as_ref().unwrap().priority);

        failure.dismiss(ErrorGroupKind::Steps);
        assert!(failure.is_empty());
        assert_eq!(failure.focus(), None);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut input = fields();
        input.name = "x".repeat(NAME_MAX_CHARS + 1);
        let failure = validate_write(&input, &[step(1, 10)]).into_failure().unwrap();
        assert!(failure.moment_errors.unwrap().fields.contains_key("name"));
    }

    #[test]
    fn start_outside_four_digit_years_is_rejected() {
        let mut input = fields();
        input.start_date_and_time = Utc.with_ymd_and_hms(10000, 1, 1, 8, 0, 0).unwrap();

        let failure = validate_write(&input, &[step(1, 10)]).into_failure().unwrap();
        let moment = failure.moment_errors.unwrap();
        assert_eq!(moment.fields["startDateAndTime"], vec![START_OUT_OF_RANGE.to_string()]);
    }

    #[test]
    fn derived_end_past_year_9999_is_rejected() {
        let mut input = fields();
        input.start_date_and_time = Utc.with_ymd_and_hms(9999, 12, 31, 23, 0, 0).unwrap();

        assert!(validate_write(&input, &[step(1, 30)]).is_clean());
        let failure = validate_write(&input, &[step(1, 30), step(2, 60)])
            .into_failure()
            .unwrap();
        let moment = failure.moment_errors.unwrap();
        assert_eq!(moment.fields["startDateAndTime"], vec![END_OUT_OF_RANGE.to_string()]);
    }
}
