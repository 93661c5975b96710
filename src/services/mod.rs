pub mod error_classifier;
pub mod report_writer;
pub mod status_poller;
pub mod submission;

pub use error_classifier::{classify, classify_error, Classification};
pub use report_writer::ReportWriter;
pub use status_poller::{poll_until_terminal, should_continue_polling, PollTarget};
pub use submission::{submit_with_retry, RetryPolicy};
