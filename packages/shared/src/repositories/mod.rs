pub mod contest_repository;
pub mod errors;
pub mod memory;
pub mod queue_repository;
