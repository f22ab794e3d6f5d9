//! Identity assignment for stored entries.
//!
//! Documents that carry a `doc_id` get a UUIDv5 derived from it, so
//! re-indexing the same logical document overwrites the same entry on every
//! backend. Documents without one get a random UUIDv4.

use uuid::Uuid;

use crate::document::Document;

/// Namespace for UUIDv5 identities derived from `doc_id` values.
///
/// Changing this value changes every derived identity.
pub const IDENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a9e_4b3d_5e71_9a0c_d2e8_41b7_53f6);

/// Assign the storage identity for a document.
pub fn assign_id(document: &Document) -> Uuid {
    match document.doc_id() {
        Some(doc_id) => id_for_doc_id(&doc_id),
        None => Uuid::new_v4(),
    }
}

/// Derive the reproducible identity for a `doc_id`.
pub fn id_for_doc_id(doc_id: &str) -> Uuid {
    Uuid::new_v5(&IDENTITY_NAMESPACE, doc_id.as_bytes())
}
