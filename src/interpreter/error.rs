// Interpreter errors
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column {0} must appear in GROUP BY or inside an aggregate")]
    UngroupedColumn(String),

    #[error("output column {0} appears more than once")]
    DuplicateColumn(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("{function}() requires a column argument")]
    MissingArgument { function: String },

    #[error("* cannot be combined with GROUP BY or aggregate functions")]
    WildcardInAggregate,

    #[error("unresolved placeholder: ${{{0}}}")]
    UnresolvedPlaceholder(String),

    #[error("unsupported query construct: {0}")]
    Unsupported(String),

    #[error("syntax error: {0}")]
    Syntax(String),
}

impl From<sqlparser::parser::ParserError> for QueryError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        QueryError::Syntax(err.to_string())
    }
}
