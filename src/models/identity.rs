use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// DICOM unique identifier.
///
/// Generated identifiers use the UUID-derived `2.25.<decimal>` root, so no
/// organisational prefix has to be registered and uniqueness follows from the
/// random v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(String);

impl Uid {
    /// Fresh identifier for this run
    pub fn generate() -> Self {
        Self(format!("2.25.{}", Uuid::new_v4().as_u128()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
