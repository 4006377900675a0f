//! Backend worker: owns the tokio runtime, the run controller and the admin session.

pub mod commands;
pub mod runtime;
