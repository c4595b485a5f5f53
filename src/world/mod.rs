pub mod area;
pub mod position;
pub mod time;
