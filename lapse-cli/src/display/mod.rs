pub mod progress;
pub mod spinner;

pub use progress::{ProgressWriterFactory, ReportProgress};
pub use spinner::Spinner;
