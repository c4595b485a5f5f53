pub mod actor;
pub mod status;
