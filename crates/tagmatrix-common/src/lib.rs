pub mod column;
pub mod entity;
pub mod value;

pub use column::*;
pub use entity::*;
pub use value::*;
