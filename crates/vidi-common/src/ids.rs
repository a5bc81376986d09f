//! Typed ID wrappers providing compile-time safety for entity identifiers.
//!
//! Each ID is 16 random bytes rendered as unpadded base64url (22 chars).
//! IDs are generated from an explicit random source so callers control
//! determinism (tests pass a seeded RNG).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Length in bytes of every identifier.
pub const ID_LEN: usize = 16;

/// Generate a newtype ID wrapper over `[u8; 16]`.
///
/// The macro produces a struct with:
/// - `generate(&mut rng)` to draw a fresh random ID
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - `Display` and `FromStr` using unpadded base64url
/// - serde as the base64url string
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(try_from = "String", into = "String")]
            pub struct $name([u8; ID_LEN]);

            impl $name {
                /// Draw a new random ID from `rng`.
                #[must_use]
                pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
                    let mut bytes = [0u8; ID_LEN];
                    rng.fill_bytes(&mut bytes);
                    Self(bytes)
                }

                /// Return the raw bytes.
                #[must_use]
                pub fn as_bytes(&self) -> &[u8; ID_LEN] {
                    &self.0
                }
            }

            impl From<[u8; ID_LEN]> for $name {
                fn from(bytes: [u8; ID_LEN]) -> Self {
                    Self(bytes)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
                }
            }

            impl FromStr for $name {
                type Err = Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    decode_id(s).map(Self)
                }
            }

            impl TryFrom<String> for $name {
                type Error = Error;

                fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
                    s.parse()
                }
            }

            impl From<$name> for String {
                fn from(id: $name) -> Self {
                    id.to_string()
                }
            }
        )+
    };
}

fn decode_id(s: &str) -> Result<[u8; ID_LEN], Error> {
    let raw = URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| Error::invalid_input(format!("malformed id {s:?}: {e}")))?;
    raw.try_into().map_err(|raw: Vec<u8>| {
        Error::invalid_input(format!(
            "id {s:?} decodes to {} bytes, expected {ID_LEN}",
            raw.len()
        ))
    })
}

typed_id! {
    /// Unique identifier for a video asset.
    VideoId,
    /// Unique identifier for a user.
    UserId,
    /// Unique identifier for an upload or watch session.
    SessionId,
}
