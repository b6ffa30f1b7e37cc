// src/engine/mod.rs

pub mod resolver;
pub mod types;

pub use resolver::FieldResolver;
pub use types::{FieldSpec, FieldValue, Locator, ResolveError};
pub use types::{css, equals, id, label, text_contains};
