use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::error::HunterError;
use crate::core::fetcher::Fetcher;
use crate::core::types::{BackendFailure, SearchResult};
use crate::sources::normalize::normalize_url;
use crate::sources::standard::query_standard;
use crate::sources::token::query_token_based;
use crate::sources::{BackendKind, BackendRegistry, SearchBackend};

#[derive(Debug, Clone, Serialize)]
pub struct AggregatedSearch {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub errors: Vec<BackendFailure>,
    pub queried: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Backend ids to query; `None` means every enabled backend.
    pub backends: Option<Vec<String>>,
    pub max_results_per_backend: usize,
    pub timeout: Duration,
}

/// Results seen so far in one run, keyed by normalized URL.
#[derive(Debug, Default)]
struct DedupState {
    seen: HashSet<String>,
    results: Vec<SearchResult>,
}

impl DedupState {
    /// First arrival wins. Returns how many rows were new.
    fn accept(&mut self, rows: Vec<SearchResult>) -> usize {
        let mut added = 0;
        for row in rows {
            let Some(key) = normalize_url(&row.url) else {
                continue;
            };
            if self.seen.insert(key) {
                self.results.push(row);
                added += 1;
            }
        }
        added
    }
}

pub struct Aggregator {
    fetcher: Arc<dyn Fetcher>,
    registry: Arc<BackendRegistry>,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn Fetcher>, registry: Arc<BackendRegistry>) -> Self {
        Self { fetcher, registry }
    }

    pub async fn search(&self, query: &str, opts: &SearchOptions) -> AggregatedSearch {
        let mut errors = Vec::new();
        let selected: Vec<SearchBackend> = match &opts.backends {
            Some(ids) => ids
                .iter()
                .filter_map(|id| match self.registry.get(id) {
                    Some(b) => Some(b.clone()),
                    None => {
                        errors.push(BackendFailure {
                            backend: id.clone(),
                            error: "unknown backend".to_string(),
                        });
                        None
                    }
                })
                .collect(),
            None => self.registry.enabled().cloned().collect(),
        };

        let state = Arc::new(Mutex::new(DedupState::default()));
        let mut handles = Vec::with_capacity(selected.len());
        for backend in &selected {
            let fetcher = Arc::clone(&self.fetcher);
            let state = Arc::clone(&state);
            let backend_task = backend.clone();
            let query = query.to_string();
            let max_results = opts.max_results_per_backend;
            let timeout = opts.timeout;
            let handle = tokio::spawn(async move {
                run_backend(fetcher.as_ref(), &backend_task, &query, max_results, timeout, &state)
                    .await
            });
            handles.push((backend.id.clone(), handle));
        }

        let (ids, handles): (Vec<String>, Vec<_>) = handles.into_iter().unzip();
        let outcomes = join_all(handles).await;
        for (id, outcome) in ids.iter().zip(outcomes) {
            let failure = match outcome {
                Ok(Ok(added)) => {
                    info!(backend = %id, added, "backend finished");
                    continue;
                }
                Ok(Err(HunterError::Backend { reason, .. })) => reason,
                Ok(Err(err)) => err.to_string(),
                Err(join_err) => format!("backend task aborted: {}", join_err),
            };
            warn!(backend = %id, error = %failure, "backend failed");
            errors.push(BackendFailure {
                backend: id.clone(),
                error: failure,
            });
        }

        let results = {
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut guard.results)
        };
        AggregatedSearch {
            total: results.len(),
            results,
            errors,
            queried: ids,
        }
    }
}

async fn run_backend(
    fetcher: &dyn Fetcher,
    backend: &SearchBackend,
    query: &str,
    max_results: usize,
    timeout: Duration,
    state: &Mutex<DedupState>,
) -> Result<usize, HunterError> {
    let budget = timeout * backend.kind.request_count();
    let query_fut = async {
        match &backend.kind {
            BackendKind::Standard(spec) => {
                query_standard(fetcher, backend, spec, query, max_results, timeout).await
            }
            BackendKind::TokenBased(spec) => {
                query_token_based(fetcher, backend, spec, query, max_results, timeout).await
            }
        }
    };
    let rows = tokio::time::timeout(budget, query_fut)
        .await
        .map_err(|_| HunterError::Backend {
            backend: backend.id.clone(),
            reason: format!("timed out after {}ms", budget.as_millis()),
        })??;

    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(guard.accept(rows))
}
