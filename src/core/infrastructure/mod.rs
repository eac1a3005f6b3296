pub mod api_client;
pub mod retry;
pub mod server_api;
pub mod upcloud_service;
