use std::sync::LazyLock;

pub mod record;
pub mod retention;
pub mod tabular;

pub static VERSION: LazyLock<String> = LazyLock::new(|| env!("CARGO_PKG_VERSION").to_string());
