pub mod error;
pub mod serializable;
