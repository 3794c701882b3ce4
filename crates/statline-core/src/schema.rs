// Schema-adaptive column resolution with a process-lifetime cache.
//
// Upstream tables gain, lose and rename columns across versions. Callers ask
// for a logical field by an ordered list of candidate names; the resolver
// answers with the first candidate the table currently exposes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::source::ColumnLister;

/// Cache key: the table plus the exact candidate list, in preference order.
type ResolutionKey = (String, Vec<String>);

/// Outcome of a lookup. `None` is the explicit "no candidate exists" marker.
pub type ColumnResolution = Option<String>;

/// Hit/miss counters for the resolution cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Resolves logical fields to physical column names.
///
/// The cache grows for the lifetime of the resolver and is never
/// invalidated. Concurrent first lookups for the same key may each query the
/// lister and write the same value; the writes are idempotent, so the race
/// is allowed and no lock is held across the listing call.
pub struct SchemaResolver {
    lister: Arc<dyn ColumnLister>,
    cache: RwLock<HashMap<ResolutionKey, ColumnResolution>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl SchemaResolver {
    pub fn new(lister: Arc<dyn ColumnLister>) -> Self {
        Self {
            lister,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Return the first of `candidates` present in `table` (compared
    /// case-insensitively), or `None` if none is.
    ///
    /// Never fails: a lister error or an empty listing is reported as `None`
    /// so a missing optional column cannot block the rest of a request.
    /// Those outcomes are not cached, so a transient listing failure does
    /// not pin the field as absent for the rest of the process.
    pub async fn resolve_column(&self, table: &str, candidates: &[&str]) -> ColumnResolution {
        if candidates.is_empty() {
            warn!("resolve_column called for {table} with no candidates");
            return None;
        }

        let key: ResolutionKey = (
            table.to_string(),
            candidates.iter().map(|c| c.to_string()).collect(),
        );

        if let Some(hit) = self.cached(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("column cache hit for {table} {candidates:?} -> {hit:?}");
            return hit;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let columns = match self.lister.list_columns(table).await {
            Ok(columns) if !columns.is_empty() => columns,
            Ok(_) => {
                warn!("no columns listed for table {table}; treating {candidates:?} as unavailable");
                return None;
            }
            Err(e) => {
                warn!("failed to list columns for table {table}: {e:#}");
                return None;
            }
        };

        let resolution = first_present(&columns, candidates);
        debug!("resolved {table} {candidates:?} -> {resolution:?}");

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, resolution.clone());

        resolution
    }

    fn cached(&self, key: &ResolutionKey) -> Option<ColumnResolution> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self
                .cache
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

/// Pick the first candidate present in `columns`, ignoring case. Returns the
/// candidate spelling, which is what callers put in query templates.
fn first_present(columns: &[String], candidates: &[&str]) -> ColumnResolution {
    let present: HashSet<String> = columns.iter().map(|c| c.to_ascii_lowercase()).collect();
    candidates
        .iter()
        .find(|c| present.contains(&c.to_ascii_lowercase()))
        .map(|c| c.to_string())
}
