pub mod pii;
pub mod reference;

pub use pii::Masked;
