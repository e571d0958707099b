pub mod queue_repository_errors;
pub mod store_errors;
