pub mod api_clients;
pub mod batch;
pub mod persistence;
