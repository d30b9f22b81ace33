//! Foundation module - logging utilities shared by the bootstrap and its applications

pub mod logging;
