//! # berkit-core
//!
//! A library for decoding, building and querying BER/DER encoded ASN.1.
//!
//! This crate provides the core functionality for:
//! - Decoding a byte buffer into a navigable tree of elements without copying content
//! - Re-encoding trees, rebuilding only the parts that changed
//! - DER canonicalization of SET contents
//! - Building, reading, matching and searching trees against a small grammar language
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`ber`]: Identifier/length octets and primitive content codecs
//! - [`tree`]: Session arena, tree cursor, decode and encode engines
//! - [`grammar`]: Grammar parser and interpreter
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use berkit_core::{grammar, Session, Value};
//!
//! // Build SEQUENCE { INTEGER 5, BOOLEAN TRUE }
//! let mut session = Session::new();
//! let mut tree = grammar::build(
//!     &mut session,
//!     "(sequence (integer) (boolean))",
//!     &[Value::Short(5), Value::Boolean(true)],
//! )?;
//! let bytes = tree.encode(&mut session)?;
//! assert_eq!(bytes.as_ref(), &[0x30, 0x06, 0x02, 0x01, 0x05, 0x01, 0x01, 0xFF]);
//!
//! // Decode it again and pull the values back out
//! let mut session = Session::new();
//! let mut tree = session.decode(bytes)?.tree;
//! let values = grammar::read(&session, &mut tree, "(sequence (integer-short) (boolean))")?;
//! assert_eq!(values, vec![Value::Short(5), Value::Boolean(true)]);
//! # Ok::<(), berkit_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`TreeVisitor`]: Walk a tree with custom callbacks
//! - [`DecoderConfig`]: Depth limits, trailing-data policy, DER-only input
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod ber;
pub mod error;
pub mod grammar;
pub mod tree;

// Re-export primary types for convenience
pub use ber::{BitString, Class, Encoding, LengthForm, Oid, Time, Zone};
pub use error::{Error, Result};
pub use grammar::Value;
pub use tree::visit::{NullVisitor, PrintConfig, StatsVisitor, TreeDump, TreeVisitor};
pub use tree::{Decoded, DecoderConfig, Node, NodeId, Session, Trailing, Tree};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default nesting limit of [`DecoderConfig`]
pub const DEFAULT_MAX_DEPTH: usize = 64;
