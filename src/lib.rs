pub mod askpass;
pub mod cohort;
pub mod config;
pub mod git;
pub mod sync;
pub mod utils;
pub mod webapi;
