mod core;
mod ops;
mod plugin;
mod serde_value;
pub mod table;

pub use crate::core::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::serde_value::*;
