pub mod alert_state;
pub mod classifier;
pub mod criteria;
