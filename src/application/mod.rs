pub mod dto;
pub mod error;
pub mod ports;
pub mod sync_engine;
pub mod sync_log;
pub mod use_cases;
