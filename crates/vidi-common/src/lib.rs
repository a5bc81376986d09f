//! Vidi-Common: Shared data model and error kinds.
//!
//! This crate provides the types every vidi component agrees on:
//!
//! - **Typed IDs**: base64url 128-bit identifiers for videos, users, sessions
//! - **Lifecycle**: `Video`, `Status` and its transition rules, upload `Part`s
//! - **Playback metadata**: `Meta` and its per-track segment templates
//! - **Error Handling**: the semantic error kinds and result alias
//!
//! # Examples
//!
//! ```
//! use vidi_common::{Status, VideoId, Error};
//!
//! let status: Status = "uploaded".parse().unwrap();
//! assert!(status.can_transition_to(Status::Ready));
//!
//! let id = VideoId::generate(&mut rand::thread_rng());
//! assert_eq!(id.to_string().len(), 22);
//!
//! assert!(matches!("done".parse::<Status>(), Err(Error::IncorrectStatus(_))));
//! ```

pub mod error;
pub mod ids;
pub mod meta;
pub mod session;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use meta::*;
pub use session::*;
pub use types::*;
