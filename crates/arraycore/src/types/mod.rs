mod long_int;
mod range;
mod r#type;

pub use long_int::LongInt;
pub use range::Range;
pub use r#type::Type;
