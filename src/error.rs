use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Domain failures raised by the moments services.
///
/// Storage plumbing still speaks `anyhow`; these variants ride inside an
/// `anyhow::Error` and are recovered with `downcast_ref` where a caller needs
/// to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum MomentsError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("moment {moment_id} has no steps")]
    NoSteps { moment_id: String },

    #[error("moment {moment_id} has non-contiguous step order {order_ids:?}")]
    OrderGap {
        moment_id: String,
        order_ids: Vec<u32>,
    },

    #[error("cannot {action} while the editor is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("step form has invalid fields: {fields:?}")]
    InvalidStepForm {
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("unknown step {0} in editor")]
    UnknownStep(String),

    #[error("unknown partition '{0}'")]
    UnknownPartition(String),

    #[error("schedule starting at {start} leaves the supported years 1 to 9999")]
    ScheduleOutOfRange { start: DateTime<Utc> },
}

impl MomentsError {
    pub fn moment_not_found(id: impl Into<String>) -> Self {
        MomentsError::NotFound {
            entity: "moment",
            id: id.into(),
        }
    }

    pub fn is_referential(&self) -> bool {
        matches!(self, MomentsError::NotFound { .. })
    }

    pub fn is_consistency(&self) -> bool {
        matches!(
            self,
            MomentsError::NoSteps { .. } | MomentsError::OrderGap { .. }
        )
    }
}
