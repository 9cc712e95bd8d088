pub mod git;
pub mod hosting;
pub mod login;
