pub mod api;
pub mod http;
pub mod upload;
pub mod workflow;
