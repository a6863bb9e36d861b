pub mod explain;
pub mod logical_plan;
pub mod optimizer;
pub mod remote_query;

pub use explain::*;
pub use logical_plan::*;
pub use optimizer::*;
pub use remote_query::*;
