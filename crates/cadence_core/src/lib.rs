pub mod calendar_sync;
pub mod drip;
pub mod error;
pub mod notifications;
pub mod release;
pub mod reminders;
pub mod service;
pub mod time_period;

pub use crate::drip::{compute_availability, Availability, CohortAnchor, ReleaseRule};
pub use crate::error::CadenceError;
pub use crate::release::{release_delay_for_index, ReleaseTemplate};
pub use crate::service::{ReleaseService, ReleaseServiceBuilder};
pub use crate::time_period::{TimePeriod, TimeSchedulingPreference};
