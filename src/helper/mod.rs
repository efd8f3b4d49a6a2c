pub mod public_helpers;
pub mod sanitization_helpers;
pub mod workflow_helpers;
