#[path = "../services/support.rs"]
mod support;
