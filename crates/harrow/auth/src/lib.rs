pub mod label;
pub mod token;
