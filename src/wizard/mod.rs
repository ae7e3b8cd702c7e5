//! Intake wizard: step gating, media handling and job submission.

pub mod controller;
pub mod step;

pub use controller::{SubmitOutcome, WizardController, WizardDeps, WizardSettings};
pub use step::WizardStep;
