//! Wire protocol for cairn record mirrors.
//!
//! Records travel as JSON: a batch of `{hash, content}` pairs where
//! `content` is the record's canonical JSON text. The receiving side
//! recomputes every hash before accepting a batch, so a mirror never stores
//! bytes under the wrong key.

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod message;

pub use auth::AuthMethod;
pub use endpoint::{endpoints, HealthResponse, InfoResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{BatchAck, ErrorBody, ObjectBatch, WireObject, MAX_BATCH_OBJECTS, PROTOCOL_VERSION};
