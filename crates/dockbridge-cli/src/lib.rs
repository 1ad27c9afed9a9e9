//! Dockbridge CLI internals
//!
//! Exposed as a library so the configuration handling can be tested on its
//! own.

pub mod config;
