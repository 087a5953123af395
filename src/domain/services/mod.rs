mod analyzer;
mod auto_fix;
mod code_blocks;
#[cfg(test)]
pub mod fakes;
mod pipeline;
mod refiner;
mod retry;
mod sessions;
mod validator;

pub use analyzer::*;
pub use auto_fix::*;
pub use code_blocks::*;
pub use pipeline::*;
pub use refiner::*;
pub use retry::*;
pub use sessions::*;
pub use validator::*;
