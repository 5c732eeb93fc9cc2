pub mod bulk;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod monitor;
pub mod reader;
pub mod session;
pub mod tag;
pub mod tag_reader;
pub mod utils;
