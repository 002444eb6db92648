//! CLI command implementations.

pub mod graph;
pub mod init;
pub mod list;
pub mod order;
pub mod simulate;
pub mod validate;
