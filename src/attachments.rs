//! Attachment manager: file metadata records plus the physical blobs they
//! point at. Metadata and blob must not diverge: the row is only removed
//! after the blob is gone (or confirmed already gone).

use std::sync::Arc;

use futures_util::future::try_join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::blob::{BlobError, BlobStore};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{FileRecord, Id};
use crate::store::Store;

static IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img[^>]+src="([^">]+)""#).expect("valid img-src pattern"));

/// Every `<img src="...">` value in the rich-text body, in document order.
/// Duplicates are preserved; callers decide what to do with them.
pub fn extract_image_srcs(body: &str) -> impl Iterator<Item = &str> + '_ {
    IMG_SRC
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Tail segment of a link, the name the blob store knows the object by.
pub fn blob_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

#[derive(Clone)]
pub struct AttachmentManager {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
}

impl AttachmentManager {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    pub async fn create(&self, link: String) -> ServiceResult<FileRecord> {
        Ok(self.store.create_file(link).await?)
    }

    /// Persists a batch of links concurrently; record ids come back in input
    /// order and one failure cancels the whole batch.
    pub async fn create_all(&self, links: Vec<String>) -> ServiceResult<Vec<Id>> {
        let records = try_join_all(links.into_iter().map(|link| self.create(link))).await?;
        Ok(records.iter().map(|f| f.id).collect())
    }

    pub async fn get(&self, id: Id) -> ServiceResult<FileRecord> {
        Ok(self.store.get_file(id).await?)
    }

    pub async fn delete_by_id(&self, id: Id) -> ServiceResult<FileRecord> {
        let file = self.store.get_file(id).await?;
        self.unlink_blob(&file.link).await?;
        Ok(self.store.delete_file(id).await?)
    }

    pub async fn delete_by_link(&self, link: &str) -> ServiceResult<FileRecord> {
        let file = self
            .store
            .find_file_by_link(link)
            .await?
            .ok_or(ServiceError::NotFound)?;
        self.unlink_blob(&file.link).await?;
        Ok(self.store.delete_file(file.id).await?)
    }

    /// A missing blob is tolerated (the record is stale, deleting it
    /// recovers); any other unlink failure aborts before the metadata row
    /// is touched.
    async fn unlink_blob(&self, link: &str) -> ServiceResult<()> {
        let name = blob_name(link);
        match self.blobs.unlink(name).await {
            Ok(()) => Ok(()),
            Err(BlobError::NotFound) => {
                warn!(%name, "blob already missing, removing metadata anyway");
                Ok(())
            }
            Err(e) => Err(ServiceError::Persistence(format!(
                "unlink of '{name}' failed: {e}"
            ))),
        }
    }

    /// Cascade used on content deletion: the explicitly attached file ids
    /// plus, when a body is supplied, every inline `<img>` source found in
    /// it. Each attempt is best-effort; failures are logged and do not block
    /// the remaining attempts. Returns how many records were removed.
    pub async fn purge_content_files(&self, file_ids: &[Id], inline_body: Option<&str>) -> usize {
        let mut removed = 0;
        for id in file_ids {
            match self.delete_by_id(*id).await {
                Ok(_) => removed += 1,
                Err(e) => warn!(file_id = id, error = %e, "failed to delete attached file"),
            }
        }
        if let Some(body) = inline_body {
            let links: Vec<String> = extract_image_srcs(body).map(str::to_owned).collect();
            for link in links {
                match self.delete_by_link(&link).await {
                    Ok(_) => removed += 1,
                    // already gone: the link was also an explicit attachment,
                    // or appeared twice in the body
                    Err(ServiceError::NotFound) => {}
                    Err(e) => warn!(%link, error = %e, "failed to delete inline image"),
                }
            }
        }
        removed
    }
}
