//! Configuration constants
//!
//! Fixed values shared by the parser, the drive builders and the machine
//! composer.

pub mod defaults;
