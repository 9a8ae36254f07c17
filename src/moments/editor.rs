//! In-memory step editing with a live schedule preview.
//!
//! Nothing here touches the store. Every change re-runs the same
//! [`derive_schedule`] the write path uses, with the open form's duration
//! standing in for the step being edited, so the projected end time moves as
//! the user types while the committed list stays untouched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{validation::step_field_errors, write::StepInput};
use crate::{
    db::models::Moment,
    error::MomentsError,
    temporal::{derive_schedule, DerivedSchedule},
};

pub const DEFAULT_STEP_MINUTES: u32 = 10;

/// A committed step in the editing list. `key` is the stored id for steps
/// loaded from a moment and a fresh uuid for steps added here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftStep {
    pub key: String,
    pub order_id: u32,
    pub name: String,
    pub description: String,
    pub duration: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stepKey", rename_all = "camelCase")]
pub enum EditorState {
    Neutral,
    Creating,
    Updating(String),
}

impl EditorState {
    fn label(&self) -> &'static str {
        match self {
            EditorState::Neutral => "neutral",
            EditorState::Creating => "creating",
            EditorState::Updating(_) => "updating",
        }
    }
}

/// Uncommitted values of the step being added or modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepForm {
    pub name: String,
    pub description: String,
    pub duration: u32,
}

impl Default for StepForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            duration: DEFAULT_STEP_MINUTES,
        }
    }
}

impl StepForm {
    fn from_step(step: &DraftStep) -> Self {
        Self {
            name: step.name.clone(),
            description: step.description.clone(),
            duration: step.duration,
        }
    }

    fn validate(&self) -> Result<(), MomentsError> {
        let fields = step_field_errors(&self.name, &self.description, self.duration);
        if fields.is_empty() {
            Ok(())
        } else {
            Err(MomentsError::InvalidStepForm { fields })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    /// `None` for the step still being created.
    pub key: Option<String>,
    pub position: u32,
    pub name: String,
    pub duration: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The row reflects uncommitted form values.
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub moment_start: DateTime<Utc>,
    pub moment_end: DateTime<Utc>,
    pub moment_duration: u32,
    pub rows: Vec<PreviewRow>,
}

#[derive(Debug, Clone)]
pub struct StepSequenceEditor {
    moment_start: DateTime<Utc>,
    steps: Vec<DraftStep>,
    state: EditorState,
    form: StepForm,
}

impl StepSequenceEditor {
    /// Editor for a brand-new moment. With no committed step yet it opens in
    /// `Creating`, and that creation cannot be cancelled.
    pub fn new(moment_start: DateTime<Utc>) -> Self {
        Self {
            moment_start,
            steps: Vec::new(),
            state: EditorState::Creating,
            form: StepForm::default(),
        }
    }

    /// Seeds the list from a stored moment, ordered by `order_id`.
    pub fn from_moment(moment: &Moment) -> Self {
        let mut stored: Vec<_> = moment.steps.iter().collect();
        stored.sort_by_key(|step| step.order_id);

        let steps: Vec<DraftStep> = stored
            .into_iter()
            .map(|step| DraftStep {
                key: step.id.clone(),
                order_id: step.order_id,
                name: step.name.clone(),
                description: step.description.clone(),
                duration: step.duration,
            })
            .collect();

        let state = if steps.is_empty() {
            EditorState::Creating
        } else {
            EditorState::Neutral
        };

        Self {
            moment_start: moment.start_date_and_time,
            steps,
            state,
            form: StepForm::default(),
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn steps(&self) -> &[DraftStep] {
        &self.steps
    }

    pub fn form(&self) -> &StepForm {
        &self.form
    }

    pub fn moment_start(&self) -> DateTime<Utc> {
        self.moment_start
    }

    pub fn set_moment_start(&mut self, start: DateTime<Utc>) {
        self.moment_start = start;
    }

    pub fn set_form_name(&mut self, name: impl Into<String>) {
        self.form.name = name.into();
    }

    pub fn set_form_description(&mut self, description: impl Into<String>) {
        self.form.description = description.into();
    }

    pub fn set_form_duration(&mut self, minutes: u32) {
        self.form.duration = minutes;
    }

    fn transition_error(&self, action: &'static str) -> MomentsError {
        MomentsError::InvalidTransition {
            action,
            state: self.state.label(),
        }
    }

    fn position_of(&self, key: &str) -> Result<usize, MomentsError> {
        self.steps
            .iter()
            .position(|step| step.key == key)
            .ok_or_else(|| MomentsError::UnknownStep(key.to_string()))
    }

    fn renumber(&mut self) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.order_id = index as u32 + 1;
        }
    }

    pub fn begin_create(&mut self) -> Result<(), MomentsError> {
        if self.state != EditorState::Neutral {
            return Err(self.transition_error("add a step"));
        }
        self.form = StepForm::default();
        self.state = EditorState::Creating;
        Ok(())
    }

    /// Blocked while the list is empty: the moment must keep at least one step.
    pub fn cancel_create(&mut self) -> Result<(), MomentsError> {
        if self.state != EditorState::Creating {
            return Err(self.transition_error("cancel step creation"));
        }
        if self.steps.is_empty() {
            return Err(MomentsError::InvalidTransition {
                action: "cancel step creation",
                state: "without any committed step",
            });
        }
        self.form = StepForm::default();
        self.state = EditorState::Neutral;
        Ok(())
    }

    /// Appends the form as a new step with the next `order_id`.
    pub fn confirm_create(&mut self) -> Result<&DraftStep, MomentsError> {
        if self.state != EditorState::Creating {
            return Err(self.transition_error("confirm a new step"));
        }
        self.form.validate()?;

        let form = std::mem::take(&mut self.form);
        self.steps.push(DraftStep {
            key: Uuid::new_v4().to_string(),
            order_id: self.steps.len() as u32 + 1,
            name: form.name.trim().to_string(),
            description: form.description,
            duration: form.duration,
        });
        self.state = EditorState::Neutral;

        let index = self.steps.len() - 1;
        Ok(&self.steps[index])
    }

    /// Opens an existing step for modification, seeding the form from it.
    pub fn select(&mut self, key: &str) -> Result<(), MomentsError> {
        if self.state != EditorState::Neutral {
            return Err(self.transition_error("select a step"));
        }
        let index = self.position_of(key)?;
        self.form = StepForm::from_step(&self.steps[index]);
        self.state = EditorState::Updating(key.to_string());
        Ok(())
    }

    fn updating_key(&self, action: &'static str) -> Result<String, MomentsError> {
        match &self.state {
            EditorState::Updating(key) => Ok(key.clone()),
            _ => Err(self.transition_error(action)),
        }
    }

    /// Drops the uncommitted edits.
    pub fn restore(&mut self) -> Result<(), MomentsError> {
        self.updating_key("restore a step")?;
        self.form = StepForm::default();
        self.state = EditorState::Neutral;
        Ok(())
    }

    pub fn confirm_update(&mut self) -> Result<(), MomentsError> {
        let key = self.updating_key("confirm a step update")?;
        self.form.validate()?;

        let index = self.position_of(&key)?;
        let form = std::mem::take(&mut self.form);
        let step = &mut self.steps[index];
        step.name = form.name.trim().to_string();
        step.description = form.description;
        step.duration = form.duration;

        self.state = EditorState::Neutral;
        Ok(())
    }

    /// Removes the step being edited and closes the numbering gap. Deleting
    /// the last step reopens creation, which cannot be cancelled.
    pub fn delete(&mut self) -> Result<DraftStep, MomentsError> {
        let key = self.updating_key("delete a step")?;
        let index = self.position_of(&key)?;

        let removed = self.steps.remove(index);
        self.renumber();
        self.form = StepForm::default();
        self.state = if self.steps.is_empty() {
            EditorState::Creating
        } else {
            EditorState::Neutral
        };
        Ok(removed)
    }

    /// Moves a step to a new list position. `order_id`s are left alone until
    /// [`commit`](Self::commit); the preview follows list order immediately.
    pub fn move_step(&mut self, from: usize, to: usize) -> Result<(), MomentsError> {
        let len = self.steps.len();
        if from >= len || to >= len {
            return Err(MomentsError::UnknownStep(format!(
                "position {} of {len}",
                from.max(to) + 1
            )));
        }
        let step = self.steps.remove(from);
        self.steps.insert(to, step);
        Ok(())
    }

    /// Durations in list order, with the open form substituted or appended.
    fn preview_durations(&self) -> Vec<u32> {
        let mut durations: Vec<u32> = self
            .steps
            .iter()
            .map(|step| match &self.state {
                EditorState::Updating(key) if *key == step.key => self.form.duration,
                _ => step.duration,
            })
            .collect();
        if self.state == EditorState::Creating {
            durations.push(self.form.duration);
        }
        durations
    }

    /// Fails with [`MomentsError::ScheduleOutOfRange`] when the steps would
    /// run past the year 9999.
    pub fn schedule(&self) -> Result<DerivedSchedule, MomentsError> {
        derive_schedule(self.moment_start, self.preview_durations())
    }

    pub fn projected_end(&self) -> Result<DateTime<Utc>, MomentsError> {
        Ok(self.schedule()?.moment_end)
    }

    pub fn projected_duration(&self) -> Result<u32, MomentsError> {
        Ok(self.schedule()?.moment_duration)
    }

    pub fn preview(&self) -> Result<Preview, MomentsError> {
        let schedule = self.schedule()?;
        let durations = self.preview_durations();

        let mut rows: Vec<PreviewRow> = self
            .steps
            .iter()
            .zip(&schedule.steps)
            .zip(&durations)
            .enumerate()
            .map(|(index, ((step, interval), duration))| {
                let pending = matches!(&self.state, EditorState::Updating(key) if *key == step.key);
                PreviewRow {
                    key: Some(step.key.clone()),
                    position: index as u32 + 1,
                    name: if pending {
                        self.form.name.clone()
                    } else {
                        step.name.clone()
                    },
                    duration: *duration,
                    start: interval.start,
                    end: interval.end,
                    pending,
                }
            })
            .collect();

        if self.state == EditorState::Creating {
            if let Some(interval) = schedule.steps.last() {
                rows.push(PreviewRow {
                    key: None,
                    position: self.steps.len() as u32 + 1,
                    name: self.form.name.clone(),
                    duration: self.form.duration,
                    start: interval.start,
                    end: interval.end,
                    pending: true,
                });
            }
        }

        Ok(Preview {
            moment_start: self.moment_start,
            moment_end: schedule.moment_end,
            moment_duration: schedule.moment_duration,
            rows,
        })
    }

    /// Committed steps in list order, renumbered `1..=N`, ready for the write
    /// contract. Any open form is ignored.
    pub fn commit(&mut self) -> Result<Vec<StepInput>, MomentsError> {
        if self.steps.is_empty() {
            return Err(MomentsError::NoSteps {
                moment_id: "<editor>".into(),
            });
        }
        self.renumber();

        Ok(self
            .steps
            .iter()
            .map(|step| StepInput {
                order_id: step.order_id,
                name: step.name.clone(),
                description: step.description.clone(),
                duration: step.duration,
            })
            .collect())
    }
}
