pub mod draft;
pub mod media;
pub mod orchestrator;
pub mod payload;
pub mod schema;

pub use draft::{FacilitySelection, FieldKey, FieldValue, ListingDraft};
pub use media::{MediaFile, MediaKind, PreviewRegistry};
pub use orchestrator::{ListingWizard, Progress, SubmissionResult, WizardError, WizardState};
pub use schema::{ListingCategory, WizardStep};
