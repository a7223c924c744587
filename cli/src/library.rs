pub mod cli;
pub mod config;
pub mod constant;
pub mod error;
pub mod lifecycle;
pub mod progress;
pub mod report;
pub mod table;
pub mod zfs;
