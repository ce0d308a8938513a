pub mod auth;
pub mod cached;
pub mod client;
pub mod error;
pub mod models;
pub mod paging;
pub mod retry;

pub use cached::{Fetched, Fetcher};
pub use client::{ApiResponse, GithubClient, ResponseMeta};
pub use error::{ApiError, FetchError, PipelineError};
pub use models::*;
