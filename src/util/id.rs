//! Id generation.

use uuid::Uuid;

/// Generate an opaque unique id (approval ids, execution ids).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
