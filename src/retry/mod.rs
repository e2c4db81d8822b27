//! Retry module
//! - policy.rs: attempt counting, backoff with jitter and the executor

pub mod policy;

pub use policy::*;
