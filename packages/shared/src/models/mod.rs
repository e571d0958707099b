pub mod competition;
pub mod contest;
pub mod participant;
pub mod queue;
