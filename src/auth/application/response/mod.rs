pub mod account_response;
