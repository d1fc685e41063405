pub mod batch;
pub mod system;
