// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod http_backend;
pub mod http_response;
pub mod memory_backend;
pub mod memory_registry;
