mod backend;
mod errors;
mod execution;
mod executor;
mod provider;
mod recorder;
mod session;

pub use backend::*;
pub use errors::*;
pub use execution::*;
pub use executor::*;
pub use provider::*;
pub use recorder::*;
pub use session::*;
