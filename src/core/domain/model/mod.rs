pub mod resource;
pub mod server;
pub mod storage;
pub mod tracked;
