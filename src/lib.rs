pub mod api;
pub mod batch;
pub mod comparison;
pub mod database;
pub mod date_range;
pub mod gateway;
pub mod matcher;
pub mod models;
pub mod urls;
