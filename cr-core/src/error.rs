//! Error types re-exported from the cr-error crate

pub use cr_error::{CamrigError, Result};
