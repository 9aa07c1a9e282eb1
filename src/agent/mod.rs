pub mod poll_cycle;
pub mod schedule;
