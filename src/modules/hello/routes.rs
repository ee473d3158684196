use axum::{routing::get, Router};

use super::controller;

/// Static route served by [`controller::hello`]
pub const HELLO: &str = "/v1/hello";
/// Parameter at segment 3: `["", "v1", "hello", ":name"]`
pub const HELLO_NAME: (&str, usize) = ("/v1/hello/:name", 3);
/// Parameter at segment 2: `["", "hello", ":sex", "call"]`
pub const CALL: (&str, usize) = ("/hello/:sex/call", 2);

pub fn hello_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(HELLO, get(controller::hello))
        .route("/v1/hello/{name}", get(controller::hello_name))
        .route("/hello/{sex}/call", get(controller::call))
}
