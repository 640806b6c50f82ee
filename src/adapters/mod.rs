//! Adapters implementing the domain ports.

pub mod memory;
pub mod object_store;
pub mod redis;
pub mod sqlite;
