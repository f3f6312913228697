mod draft;
mod job_list;
mod job_progress;
mod presets;
mod results;

pub use draft::{DraftView, SharedDraft};
pub use job_list::JobListView;
pub use job_progress::JobProgressView;
pub use presets::PresetsView;
pub use results::ResultsView;
