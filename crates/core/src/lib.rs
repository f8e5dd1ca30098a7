//! Strata Core - portable value and error types for the Strata document database.
//!
//! - `JsonValue`: the JSON-like container bounds and expressions serialize into,
//!   ordered by `compare_values`
//! - `Error`: error types shared by the query crates
//!
//! # Example
//!
//! ```rust
//! use strata_core::{compare_values, JsonObject, JsonValue};
//! use core::cmp::Ordering;
//!
//! let bound = JsonValue::Object(JsonObject::new().with("bound", 18).with("include", true));
//! assert_eq!(bound.to_json_string().unwrap(), r#"{"bound":18,"include":true}"#);
//!
//! assert_eq!(
//!     compare_values(&JsonValue::from(18), &JsonValue::from("18")),
//!     Ordering::Less
//! );
//! ```

#![no_std]

extern crate alloc;

mod error;
mod value;

pub use error::{Error, Result};
pub use value::{compare_values, JsonObject, JsonValue};
