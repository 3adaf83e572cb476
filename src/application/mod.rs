// Application layer - Use cases over the domain and the query interpreter
pub mod dashboard_service;
pub mod parameter_resolver;
pub mod query_backend;
pub mod streaming_service;
pub mod tile_pipeline;
