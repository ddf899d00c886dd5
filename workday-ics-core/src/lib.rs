//! Workday ICS Core Library
//!
//! This library converts Workday course-registration exports into
//! recurring ICS calendar files.

pub mod convert;
pub mod error;
pub mod ics;
pub mod pattern;
pub mod recurrence;
pub mod schedule;
pub mod sheet;
pub mod sources;
pub mod types;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        convert::*, ics::*, pattern::*, recurrence::*, schedule::*, sheet::*, sources::*,
        types::*,
    };
}
