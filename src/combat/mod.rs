pub mod skills;
pub mod triggers;
