//! # Spindle
//!
//! Schema-driven binary serialization and byte-level comparison for a
//! JSON-like value model.
//!
//! ## Architecture
//!
//! ```text
//! Value ─────────────┐
//!   (atoms, arrays,  │        GenericCodec           tagged, schema-free
//!    records, ...)   ├──────► SchemaCodec            tags implied by a Schema
//!                    │          └── LazyRecord / LazyArray
//! Schema ────────────┘                 │
//!   (matches, merge, or)               ▼
//!                               encoded bytes ──────► Comparator
//!                                                     (compare, long_hash)
//! ```
//!
//! Every value has one total order across all kinds: first by logical
//! type, then within the type. Encoded values compare with the same result
//! as their decoded forms, and [`Comparator::long_hash`] agrees with
//! [`Value::long_hash`].
//!
//! ## Usage
//!
//! ### Generic encoding
//! ```rust
//! use spindle::{FullSerializer, GenericCodec, Value};
//!
//! let codec = GenericCodec::new();
//! let value = Value::array(vec![Value::Long(1), Value::Long(2), Value::from("x")]);
//! let bytes = codec.to_bytes(&value).unwrap();
//! assert_eq!(codec.from_bytes(&bytes).unwrap(), value);
//! ```
//!
//! ### Schema-specialized encoding
//! ```rust
//! use spindle::{FullSerializer, GenericCodec, Schema, SchemaCodec, Value};
//!
//! let schema = Schema::array(vec![Schema::long()], Some(Schema::string()));
//! let codec = SchemaCodec::new(&schema);
//! let value = Value::array(vec![Value::Long(1), Value::from("a"), Value::from("b")]);
//! let bytes = codec.to_bytes(&value).unwrap();
//! assert!(bytes.len() < GenericCodec::new().to_bytes(&value).unwrap().len());
//! ```
//!
//! ### Sessions
//! ```rust,ignore
//! use spindle::{CodecSession, Config};
//!
//! spindle::logging::init(&config.logging)?;
//! let session = CodecSession::new(Config::load()?);
//! let mut comparator = session.comparator_for(&schema);
//! ```

pub mod codec;
pub mod comparator;
pub mod config;
pub mod error;
pub mod logging;
pub mod schema;
pub mod session;
pub mod value;

pub use codec::{
    BasicSerializer, Encoding, FullSerializer, GenericCodec, LazyArray, LazyRecord, SchemaCodec,
    SchemaCodecFactory,
};
pub use comparator::Comparator;
pub use config::{CodecConfig, Config, LogFormat, LoggingConfig};
pub use error::{CodecError, CodecResult, SchemaError, SchemaResult, ValueError, ValueResult};
pub use schema::{Bool3, RecordField, Schema, SchemaKind};
pub use session::CodecSession;
pub use value::{
    ArrayBuilder, ArrayValue, FunctionValue, JavaObjectValue, LogicalType, MutableString,
    RecordBuilder, RecordValue, RegexValue, SpanValue, SpilledArray, Value,
};
