//! Wire envelope, identifiers and failure taxonomy shared by the formwire client
//! and its command-line driver.

pub mod domain;
pub mod error;
pub mod protocol;
