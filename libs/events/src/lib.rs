//! # actorlens-events
//!
//! Actor state change records as published on the runtime's actor channel.
//!
//! ## Design Principles
//!
//! - Records are partial updates, not snapshots: a field that is absent on
//!   the wire is `None` in [`ActorUpdate`] and must not touch stored state
//! - `pid = 0` is meaningful (the actor could not be scheduled) and is kept
//!   distinct from "pid not carried"
//! - Unknown enum values fail decoding; nothing is silently defaulted except
//!   the zero-ordinal `state`, which the runtime omits on the wire
//!
//! ## Message Shape
//!
//! A channel message is a `(key, payload)` pair. The key is the hex actor id
//! and the payload is a camelCase JSON object, or nothing at all for
//! heartbeats/tombstones which decode to `Ok(None)`.

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::DecodeError;
pub use types::*;
