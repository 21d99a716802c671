//! Remote object enumeration
//!
//! Produces the objects under a prefix as a lazy stream that follows listing
//! pages until the store reports no more. When the bucket has versioning
//! enabled every stored version is listed, otherwise only live keys.

use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{Error, Result};
use crate::traits::{ListPage, ListedObject, ObjectStore, RemoteObject};
use crate::versioning::VersioningResolver;

/// Lazily produced remote objects
pub type RemoteObjects<'a> = BoxStream<'a, Result<RemoteObject>>;

/// Enumerates remote objects, choosing a listing strategy per bucket mode
pub struct ObjectEnumerator<'a> {
    store: &'a dyn ObjectStore,
    resolver: &'a VersioningResolver<'a>,
}

impl<'a> ObjectEnumerator<'a> {
    pub fn new(store: &'a dyn ObjectStore, resolver: &'a VersioningResolver<'a>) -> Self {
        Self { store, resolver }
    }

    /// Objects under `prefix`
    ///
    /// Each call starts a fresh listing. Entries without a key are skipped.
    /// A listing failure is yielded as an error and ends the stream.
    pub async fn enumerate(&self, prefix: &str) -> RemoteObjects<'a> {
        let mode = self.resolver.resolve().await;
        let store = self.store;
        let bucket = self.resolver.bucket();
        let prefix = prefix.to_string();

        let entries = if mode.lists_versions() {
            tracing::debug!(bucket, prefix = %prefix, "Listing object versions");
            paginate(move |marker| {
                let prefix = prefix.clone();
                async move { store.list_object_versions(bucket, &prefix, marker).await }
            })
        } else {
            tracing::debug!(bucket, prefix = %prefix, %mode, "Listing current objects");
            paginate(move |token| {
                let prefix = prefix.clone();
                async move { store.list_objects(bucket, &prefix, token).await }
            })
        };

        let versioned = mode.lists_versions();
        entries
            .try_filter_map(move |entry| async move {
                let object = entry.into_remote(versioned);
                if object.is_none() {
                    tracing::debug!("Skipping listing entry without a key");
                }
                Ok::<_, Error>(object)
            })
            .boxed()
    }
}

/// Flatten a paginated listing into a stream of entries
///
/// `fetch` receives `None` for the first page and the previous page's marker
/// afterwards. The stream ends only when a page has no next marker.
fn paginate<'a, M, F, Fut>(fetch: F) -> BoxStream<'a, Result<ListedObject>>
where
    M: Send + 'a,
    F: FnMut(Option<M>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<ListPage<M>>> + Send + 'a,
{
    // Outer None: exhausted. Inner None: first page.
    let start: Option<Option<M>> = Some(None);

    stream::try_unfold((fetch, start), |(mut fetch, cursor)| async move {
        let Some(marker) = cursor else {
            return Ok(None);
        };
        let page = fetch(marker).await?;
        let cursor = page.next.map(Some);
        let entries = stream::iter(page.entries.into_iter().map(Ok::<_, Error>));
        Ok::<_, Error>(Some((entries, (fetch, cursor))))
    })
    .try_flatten()
    .boxed()
}
