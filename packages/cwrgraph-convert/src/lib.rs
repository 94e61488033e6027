/*
 * cwrgraph-convert - CWR to content-addressed object graph
 *
 * Converts a fixed-width CWR registration file into a merkle-style object
 * graph and returns the identifier of the root object.
 *
 * Architecture:
 * - Record parser (fixed-width column tables)
 * - Line dispatcher -> worker pool -> result collector (tokio tasks, bounded queues)
 * - Graph builder (ordered fold: file -> groups -> transactions -> details)
 * - Root encode + store
 */

// Public modules
pub mod config;
pub mod converter;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod record;

// Re-exports
pub use config::{ConverterConfig, TransactionKeying};
pub use converter::{ConversionReport, Converter};
pub use error::{ConfigError, ConvertError, ErrorCategory, Result};
pub use graph::{CwrFile, GraphBuilder, Group, Transaction, RECORD_TYPE_FIELD};
pub use pipeline::{DispatchStats, IndexedObject, ResultCollector};
pub use record::{
    GroupHeader, GroupTrailer, Header, PublisherControl, Record, RecordTag, UnknownRecordTag,
    WorkRegistration,
};
