//! Keyword registry: deduplicated tag strings shared by posts and questions.

use std::sync::Arc;

use futures_util::future::try_join_all;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Id, Keyword};
use crate::store::Store;

/// Stored display form: first letter capitalized, rest untouched.
pub fn display_form(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The registry's matching rule: a stored body matches when it contains the
/// raw input as a case-sensitive substring. Deliberately looser than exact
/// equality ("Go" matches a stored "Golang" but "golang" does not match a
/// stored "Go"); first match by ascending id wins.
pub fn matches(stored_body: &str, raw: &str) -> bool {
    stored_body.contains(raw)
}

#[derive(Clone)]
pub struct KeywordRegistry {
    store: Arc<dyn Store>,
}

impl KeywordRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, raw: &str) -> ServiceResult<Id> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::Validation("empty keyword".into()));
        }
        Ok(self.store.resolve_keyword(trimmed).await?.id)
    }

    /// Resolves a batch concurrently; ids come back in input order and any
    /// single failure fails the whole batch before the caller commits.
    pub async fn resolve_all(&self, raws: &[String]) -> ServiceResult<Vec<Id>> {
        try_join_all(raws.iter().map(|raw| self.resolve(raw))).await
    }

    pub async fn list(&self, take: Option<usize>) -> ServiceResult<Vec<Keyword>> {
        Ok(self.store.list_keywords(take).await?)
    }
}
