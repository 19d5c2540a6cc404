pub mod time;

pub use time::{format_millis, now_millis};
