use axum::{extract::Path, Json};

pub async fn hello() -> Json<&'static str> {
    Json("Hello world!")
}

pub async fn hello_name(Path(name): Path<String>) -> Json<String> {
    Json(format!("hello {}", name))
}

pub async fn call(Path(sex): Path<String>) -> Json<String> {
    Json(format!("I am {}", sex))
}
