pub mod repository;

pub use repository::{MetricsRepository, RepoStats};
