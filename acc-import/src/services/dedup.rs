use std::collections::HashSet;

use super::blob_store::{BlobStore, StorageError};
use crate::models::{pathname_for, ACC_PREFIX};

const LIST_LIMIT: usize = 1000;
const MAX_LIST_PAGES: usize = 20;

/// Which of `photo_ids` already have an object under `acc/`, in listing order.
///
/// Stops as soon as every id is found, the listing runs out, or the page cap
/// is reached. Ids not seen by then are reported as absent.
pub async fn find_uploaded_ids(
    blobs: &dyn BlobStore,
    photo_ids: &[String],
) -> Result<Vec<String>, StorageError> {
    let mut wanted: HashSet<String> = photo_ids.iter().map(|id| pathname_for(id)).collect();
    let mut uploaded = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;

    while pages < MAX_LIST_PAGES && !wanted.is_empty() {
        pages += 1;
        let page = blobs.list(ACC_PREFIX, LIST_LIMIT, cursor.as_deref()).await?;

        for blob in &page.blobs {
            if wanted.remove(&blob.pathname) {
                uploaded.push(blob.pathname[ACC_PREFIX.len()..].to_string());
            }
        }

        if !page.has_more {
            break;
        }
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    tracing::debug!(
        requested = photo_ids.len(),
        found = uploaded.len(),
        pages,
        "Dedup check finished"
    );
    Ok(uploaded)
}
