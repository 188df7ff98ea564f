//! Foundation module - Core utilities shared by the runtime
//!
//! Currently this only hosts the logging facade used by every subsystem.

pub mod logging;
