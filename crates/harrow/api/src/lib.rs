pub mod action;
pub mod config;
pub mod error;
pub mod job;
pub mod principal;
