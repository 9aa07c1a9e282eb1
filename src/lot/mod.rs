pub mod models;
pub mod price;
pub mod time_model;
