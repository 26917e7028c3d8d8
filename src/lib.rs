pub mod config;
pub mod styling;
pub mod trace;
