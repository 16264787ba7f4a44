//! Macros for defining typed ID types.

/// Macro to define a typed ID with a fixed byte width.
///
/// This generates a newtype wrapper around `[u8; N]` with:
/// - `LEN` and `KIND` constants
/// - `nil()` / `is_nil()` for the reserved all-`0xff` value
/// - `random()` to generate a fresh ID
/// - `parse()` to parse from lowercase or uppercase hex
/// - `Display` and `FromStr` implementations
/// - `Serialize` and `Deserialize` implementations (as hex strings)
/// - `Ord`, `Hash`, and other standard traits
///
/// # Example
///
/// ```ignore
/// define_id!(ActorId, 16, "actor id");
///
/// let actor_id = ActorId::random();
/// let parsed: ActorId = "8f0c0a2e6d1b4c5f9a7e3d2c1b0a9f8e".parse()?;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $len:literal, $kind:literal) => {
        /// A typed ID for this resource type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width of this ID in bytes.
            pub const LEN: usize = $len;

            /// Human readable name used in error messages.
            pub const KIND: &'static str = $kind;

            /// The reserved nil value (all bytes `0xff`).
            #[must_use]
            pub const fn nil() -> Self {
                Self([0xff; $len])
            }

            /// Returns true if this is the nil value.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.iter().all(|b| *b == 0xff)
            }

            /// Creates a new random ID.
            ///
            /// Never returns the nil value.
            #[must_use]
            pub fn random() -> Self {
                loop {
                    let id = Self(rand::random::<[u8; $len]>());
                    if !id.is_nil() {
                        return id;
                    }
                }
            }

            /// Creates an ID from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Parses an ID from its hex representation.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                if s.len() != $len * 2 {
                    return Err($crate::IdError::InvalidLength {
                        kind: Self::KIND,
                        expected: $len * 2,
                        actual: s.len(),
                    });
                }

                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes).map_err(|e| $crate::IdError::InvalidHex {
                    kind: Self::KIND,
                    message: e.to_string(),
                })?;

                Ok(Self(bytes))
            }

            /// Formats the ID as lowercase hex.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}
