// src/lib.rs

#[macro_use]
pub mod macros;
#[macro_use]
pub mod log;

pub mod config;
pub mod core;
pub mod engine;
pub mod specs;

pub mod file;
pub mod runner;
pub mod session;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;
