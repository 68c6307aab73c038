pub mod client;
pub mod error;
pub mod import;
pub mod model;
pub mod parse;
pub mod runtime;

pub use crate::client::{BoltConfig, BoltConnector, BoltSession, Connect};
pub use crate::error::{Result, UmbraError};
pub use crate::import::{ImportOptions, ImportSummary, ParserReport};
pub use crate::model::{Batch, BatchSet, Bucket, ClauseFlags, Statement};
pub use crate::parse::StatementStream;
pub use crate::runtime::ShutdownFlag;
