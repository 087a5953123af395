pub mod backends;
pub mod executors;
pub mod process;
pub mod recorders;
