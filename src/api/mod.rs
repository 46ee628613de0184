//! API module for directory REST interactions

mod client;
pub mod departments;
pub mod directory;
pub mod error;
pub mod retry;
pub mod users;

pub use client::DirectoryClient;
pub use directory::Directory;
pub use error::{ApiError, ApiResult, FailureClass};
pub use retry::RetryPolicy;
