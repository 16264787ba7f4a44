//! # actorlens-id
//!
//! Identity types for the actors, jobs, nodes and workers reported on the
//! runtime's actor channel.
//!
//! ## Design Principles
//!
//! - IDs are fixed-width binary values assigned by the runtime, never by us
//! - All IDs have a canonical string representation: lowercase hex
//! - IDs are typed to prevent mixing different resource types
//! - Every ID type has a reserved nil value (all bytes `0xff`)
//!
//! ## Widths
//!
//! | Type | Bytes | Hex chars |
//! |------------|-------|-----------|
//! | `JobId`    | 4     | 8         |
//! | `ActorId`  | 16    | 32        |
//! | `NodeId`   | 28    | 56        |
//! | `WorkerId` | 28    | 56        |
//!
//! The nil `NodeId` is the sentinel meaning "no node assigned yet".

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;
