//! tfsettle - read-after-write consistency checking for Terraform providers
//!
//! Decides whether a resource re-read from a remote API has settled to the
//! state captured when its read loop started, and tells the retry loop to keep
//! polling until it has.

pub mod checker;
pub mod config;
pub mod resource_data;
pub mod retry;
pub mod schema;
pub mod state;
pub mod value;

mod error;

pub use checker::{CheckerRegistry, ConsistencyChecker, MismatchError, TrackedResource};
pub use config::CheckerConfig;
pub use error::SettleError;
pub use resource_data::{MemoryResourceData, ResourceData};
pub use retry::{RetryError, RetryFailure, RetryPolicy, with_retries};
pub use schema::{AttributeSchema, DiffSuppress, SchemaDocument, SchemaMap, SetHash, ValueType};
pub use state::StateSnapshot;
pub use value::Value;
