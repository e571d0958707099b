pub mod config;
pub mod matchmaker;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use crate::matchmaker::{Matchmaker, MatchmakerError};
