//! Client-side driver for barge resumable uploads.
//!
//! The driver talks to an upload coordinator through the [`StorageApi`]
//! trait, keeps an advisory local record of the session it opened, hands the
//! actual byte transfer to a pluggable [`Transport`], and runs the
//! decide/upload/recover retry loop that makes uploads survive crashes and
//! transient failures.

pub mod api;
pub mod driver;
pub mod progress;
pub mod session;
pub mod transport;

pub use api::StorageApi;
pub use driver::UploadDriver;
pub use progress::{LogProgressListener, Progress, ProgressListener};
pub use session::SessionStore;
pub use transport::{file_part_md5, Transport, TransportBuilder, TransportJob};
