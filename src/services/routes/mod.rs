pub mod table;
pub mod types;

pub use table::RouteTable;
pub use types::{Classification, DynamicRoute, RouteError};
