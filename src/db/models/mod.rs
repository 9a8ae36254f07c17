pub mod destination;
pub mod moment;
pub mod step;

pub use destination::DestinationSummary;
pub use moment::{Moment, MomentRecord};
pub use step::{Step, StepRecord};
