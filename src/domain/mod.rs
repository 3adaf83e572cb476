// Domain layer - Dashboard, tile, filter and dataset models
pub mod dashboard;
pub mod data_source;
pub mod dataset;
pub mod filter;
pub mod layout;
pub mod query_result;
pub mod tile;
