//! Switchboard Core - Value Model and Cache Naming
//!
//! Pure, I/O-free building blocks for the switchboard data-access layer:
//! the row/parameter value model, the JSON codec used for cache
//! serialization, deterministic cache-key derivation, and lexical SQL
//! table extraction. The I/O layer lives in `switchboard-store`.

pub mod codec;
pub mod error;
pub mod keys;
pub mod tables;
pub mod value;

pub use codec::{decode_rows, decode_value, encode_rows, encode_value};
pub use error::{CacheError, ConfigError, DbError, SwitchboardError, SwitchboardResult};
pub use keys::{CacheKey, ParamHash};
pub use tables::extract_tables;
pub use value::{Params, Row, SqlValue};
