pub mod contest_service;
pub mod errors;
pub mod pairing_service;
pub mod queue_service;
