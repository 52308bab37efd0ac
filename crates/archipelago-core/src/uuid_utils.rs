//! UUID helpers.
//!
//! Notes, tags and summaries get UUIDv7 ids so that primary-key order follows
//! creation order.

use uuid::Uuid;

/// Generate a new time-ordered UUIDv7.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Whether `id` is a version 7 UUID.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}
