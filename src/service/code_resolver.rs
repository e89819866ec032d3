//! Access code to page resolution.

use std::sync::Arc;

use crate::domain::{AccessCode, PageId};
use crate::error::KeepsakeError;
use crate::store::{DocumentStore, StoreError};

/// Resolves user-supplied access codes to page identities.
///
/// Zero matches and malformed codes both come back as
/// [`KeepsakeError::CodeNotFound`]. If several pages share a code, the first
/// one in store order wins and the collision is only logged.
#[derive(Debug, Clone)]
pub struct CodeResolver {
    store: Arc<dyn DocumentStore>,
}

impl CodeResolver {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolves `candidate` to a page identity.
    ///
    /// Comparison is exact and case-sensitive. A candidate that cannot be an
    /// access code never reaches the store.
    ///
    /// # Errors
    ///
    /// Returns [`KeepsakeError::CodeNotFound`] when nothing matches and
    /// [`KeepsakeError::Transient`] when the store cannot be queried.
    pub async fn resolve(&self, candidate: &str) -> Result<PageId, KeepsakeError> {
        let Ok(code) = AccessCode::parse(candidate) else {
            tracing::debug!(code_len = candidate.len(), "malformed access code");
            return Err(KeepsakeError::CodeNotFound);
        };

        let matches = self
            .store
            .find_pages_by_access_code(code.as_str())
            .await
            .map_err(|err| match err {
                StoreError::Unavailable(msg) => KeepsakeError::Transient(msg),
                other => KeepsakeError::Transient(other.to_string()),
            })?;

        let Some(first) = matches.first().copied() else {
            return Err(KeepsakeError::CodeNotFound);
        };
        if matches.len() > 1 {
            tracing::warn!(
                page_id = %first,
                matches = matches.len(),
                "access code collision, resolving to the oldest page"
            );
        }
        Ok(first)
    }

    /// Resolves a public `/surprise/{slug}/{code}` link. The slug is
    /// cosmetic and ignored.
    ///
    /// # Errors
    ///
    /// Same as [`CodeResolver::resolve`].
    pub async fn resolve_with_slug(&self, _slug: &str, code: &str) -> Result<PageId, KeepsakeError> {
        self.resolve(code).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::{NewPage, OwnerId, Page};
    use crate::store::{MemoryStore, WriteOp};

    async fn insert(store: &MemoryStore, code: &str, age_secs: i64) -> PageId {
        let Ok(code) = AccessCode::parse(code) else {
            panic!("test code must be valid");
        };
        let page = Page::new(
            PageId::new(),
            OwnerId::new("owner"),
            code,
            NewPage::default(),
            Utc::now() - Duration::seconds(age_secs),
        );
        let id = page.id;
        let applied = store
            .apply(&OwnerId::new("owner"), WriteOp::CreatePage(Box::new(page)))
            .await;
        assert!(applied.is_ok());
        id
    }

    #[tokio::test]
    async fn single_match_resolves() {
        let store = Arc::new(MemoryStore::default());
        let id = insert(&store, "AB3DEFGH9K", 0).await;
        let resolver = CodeResolver::new(store);
        assert_eq!(resolver.resolve("AB3DEFGH9K").await.ok(), Some(id));
    }

    #[tokio::test]
    async fn unmatched_and_wrong_case_are_not_found() {
        let store = Arc::new(MemoryStore::default());
        insert(&store, "AB3DEFGH9K", 0).await;
        let resolver = CodeResolver::new(store);
        assert!(matches!(
            resolver.resolve("ZZZZZZZZZZ").await,
            Err(KeepsakeError::CodeNotFound)
        ));
        assert!(matches!(
            resolver.resolve("ab3defgh9k").await,
            Err(KeepsakeError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn malformed_code_is_not_found_even_when_store_is_down() {
        let store = Arc::new(MemoryStore::default());
        store.set_available(false);
        let resolver = CodeResolver::new(store);
        assert!(matches!(
            resolver.resolve("O0I1").await,
            Err(KeepsakeError::CodeNotFound)
        ));
    }

    #[tokio::test]
    async fn collision_resolves_to_oldest_page() {
        let store = Arc::new(MemoryStore::default());
        let newer = insert(&store, "AB3DEFGH9K", 0).await;
        let older = insert(&store, "AB3DEFGH9K", 60).await;
        let resolver = CodeResolver::new(store);
        let Ok(got) = resolver.resolve("AB3DEFGH9K").await else {
            panic!("collision must still resolve");
        };
        assert_eq!(got, older);
        assert_ne!(got, newer);
    }

    #[tokio::test]
    async fn unreachable_store_is_transient() {
        let store = Arc::new(MemoryStore::default());
        store.set_available(false);
        let resolver = CodeResolver::new(store);
        let err = resolver.resolve("AB3DEFGH9K").await;
        assert!(matches!(err, Err(KeepsakeError::Transient(_))));
    }

    #[tokio::test]
    async fn slug_is_ignored() {
        let store = Arc::new(MemoryStore::default());
        let id = insert(&store, "AB3DEFGH9K", 0).await;
        let resolver = CodeResolver::new(store);
        assert_eq!(
            resolver
                .resolve_with_slug("anything-at-all", "AB3DEFGH9K")
                .await
                .ok(),
            Some(id)
        );
    }
}
