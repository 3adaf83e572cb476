// Query interpreter - Constrained SELECT over in-memory tables
pub mod ast;
pub mod error;
pub mod executor;
pub mod parser;
pub mod registry;

pub use error::QueryError;
pub use executor::execute;
pub use registry::DatasetRegistry;
