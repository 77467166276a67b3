pub mod catalog;
pub mod commands;
pub mod config;
pub mod error;
pub mod install;
pub mod records;
pub mod reconcile;
pub mod runtime;
pub mod scan;
