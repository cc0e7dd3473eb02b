pub mod code;

pub use code::{isbn13_to_isbn10, normalize, CodeType, NormalizedCode};
