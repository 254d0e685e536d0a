//! # rowsync Value
//!
//! Scalar values exchanged between a record source and a destination store.
//!
//! Sources and destinations rarely agree on types: a database may hand back
//! an integer key where a list service returns the same key as text. This
//! crate provides:
//! - [`Value`], the typed scalar carried in every field map
//! - [`Canonical`], the single comparable form used for key matching and
//!   field equality
//!
//! ## Coercion Rules
//!
//! - Integral floats inside the `i64` range compare as integers
//! - Canonical integer text (`"42"`, `"-7"`) compares as an integer
//! - Canonical decimal text (`"1.50"`) compares as the float it denotes
//! - Everything else compares exactly, including type
//!
//! ## Usage
//!
//! ```
//! use rowsync_value::Value;
//!
//! let from_source = Value::Integer(5);
//! let from_destination = Value::Text("5".into());
//! assert_eq!(from_source.canonical(), from_destination.canonical());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod canonical;
mod error;
mod value;

pub use canonical::Canonical;
pub use error::{ValueError, ValueResult};
pub use value::Value;
