mod binders;
mod health;
mod identity;
pub mod values;

pub use binders::{decode_blob, split_path};
pub use health::{health_check, readiness_check};
pub use identity::whoami;
pub use values::{create_value, delete_value, get_value, list_values};
