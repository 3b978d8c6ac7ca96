#[path = "integration/basic.rs"]
mod basic;
