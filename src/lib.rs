//! Async client for the D3 file-processing API.
//!
//! A typical run uploads a local file, submits an operation over the returned
//! file key and polls the task until it finishes:
//!
//! ```no_run
//! use d3_client::{ClientConfig, D3Client, PollOptions, StatusQuery, UploadOptions};
//!
//! # async fn run() -> d3_client::Result<()> {
//! let client = D3Client::new(ClientConfig::new("my-api-key"))?;
//!
//! let session = client
//!     .upload_file(UploadOptions::from_path("report.pdf"))
//!     .await?;
//! let operation = client.convert([session.file_key], "png", None).await?;
//! let status = client
//!     .poll_status(&StatusQuery::new(operation.main_task_id), PollOptions::new())
//!     .await?;
//!
//! for link in status.download_links() {
//!     println!("{}", link);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod helpers;
pub mod models;
pub mod observer;
pub mod operation;
pub mod status;
pub mod upload;

pub use client::D3Client;
pub use config::ClientConfig;
pub use error::{D3Error, Result};
pub use models::{
    FileResult, Notes, Operation, OperationRequest, OperationStatus, Parameters, StatusQuery,
    SupportedOperation, SupportedOperationQuery, TaskStatus, UploadSession, camel_case_view,
};
pub use observer::{ChannelObserver, Observer};
pub use status::PollOptions;
pub use upload::{UploadOptions, UploadProgress};
