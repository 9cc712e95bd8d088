pub mod git_engine;
pub mod hosting_api;
pub mod login_provider;
pub mod sync_observer;
