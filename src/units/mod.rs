pub mod engine;
pub mod group;
pub mod overlap;
pub mod registry;
pub mod slots;
pub mod tickset;
pub mod unit;
