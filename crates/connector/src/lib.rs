pub mod handle;
pub mod query;
pub mod session;

pub use handle::*;
pub use query::*;
pub use session::*;
