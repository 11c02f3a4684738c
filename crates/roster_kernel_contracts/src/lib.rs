#![forbid(unsafe_code)]

pub mod assignment;
pub mod audit;
pub mod common;
pub mod org;
pub mod report;
pub mod worker;

pub use common::{
    ContractViolation, MonotonicTimeNs, ReasonCodeId, RecordStatus, SchemaVersion, Validate,
};
