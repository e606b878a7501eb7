use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PathError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("invalid operation: {0}")]
    InvalidOp(String),
    #[error("normalization did not converge after {0} iterations")]
    NormalizeDidNotConverge(usize),
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown block format: {0}")]
    UnknownFormat(String),
    #[error("unknown mark: {0}")]
    UnknownMark(String),
    #[error("missing argument `{0}`")]
    MissingArg(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl From<PathError> for CommandError {
    fn from(value: PathError) -> Self {
        CommandError::Apply(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown query: {0}")]
    UnknownQuery(String),
    #[error("missing argument `{0}`")]
    MissingArg(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error("failed to encode query result: {0}")]
    Encode(String),
    #[error("failed to decode query result: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("duplicate query id: {0}")]
    DuplicateQuery(String),
}
