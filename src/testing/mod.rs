//! Testing utilities
//!
//! Mock implementations of the client traits so consumers can test without
//! a running broker.

pub mod mocks;

pub use mocks::MockClient;
