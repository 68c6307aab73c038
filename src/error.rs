use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, UmbraError>;

/// Fatal failure categories of the import core. Transient query failures
/// are not represented here: they are absorbed by the retry loop and only
/// surface through batch attempt counters.
#[derive(Debug, Error)]
pub enum UmbraError {
    #[error("input failure: {0}")]
    Io(#[from] io::Error),
    #[error("connection failure: {0}")]
    Connect(String),
    #[error("query failure: {0}")]
    Query(String),
    #[error("session failure: {0}")]
    Session(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("import canceled")]
    Canceled,
}
