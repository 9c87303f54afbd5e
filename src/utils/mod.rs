pub mod errors;
pub mod http;

pub use errors::{ApiError, PipelineError, RepoError};
pub use http::HttpError;
