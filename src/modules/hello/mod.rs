pub mod controller;
pub mod routes;

pub use routes::hello_routes;
