//! Stage submission state machine.
//!
//! Every status change is a conditional update keyed on the status the
//! caller observed, so two racing transitions cannot both apply.

mod bulk;
mod service;

pub use service::{SubmissionWorkflow, effective_deadline};
