//! Domain layer: models, state machines, ports, and errors.

pub mod errors;
pub mod models;
pub mod ports;
