pub mod alerts;
pub mod logger;
