//=====================================================
// File: loader/mod.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Asynchronous loading of resolved dependencies
// Objective: Build one deferred task per resolved import, run the batch
//            concurrently, and hand back every result or the first failure
//=====================================================

pub mod fetch;
pub mod native;
pub mod staging;

use crate::config::LoaderConfig;
use crate::errors::{ImportError, ImportErrorKind};
use crate::reference::{Location, ModuleKind, ModuleReference, ResolutionCandidate};
use fetch::{FetchFailure, HttpFetcher, RemoteFetch};
use native::{CodeLoader, PluginFactory};
use staging::RemoteStagingCache;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::task::JoinSet;

type TaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, ImportError>> + Send + 'static>>;

/// Deferred load of one import. Nothing happens until [`LoaderTask::run`]
/// is awaited, and running consumes the task.
pub struct LoaderTask<T> {
    reference: ModuleReference,
    future: TaskFuture<T>,
}

impl<T: Send + 'static> LoaderTask<T> {
    fn new<F>(reference: ModuleReference, future: F) -> Self
    where
        F: Future<Output = Result<T, ImportError>> + Send + 'static,
    {
        Self {
            reference,
            future: Box::pin(future),
        }
    }

    pub fn reference(&self) -> &ModuleReference {
        &self.reference
    }

    pub async fn run(self) -> Result<T, ImportError> {
        self.future.await
    }

    pub fn map<U, F>(self, f: F) -> LoaderTask<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let future = self.future;
        LoaderTask::new(self.reference, async move { future.await.map(f) })
    }
}

impl<T> std::fmt::Debug for LoaderTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderTask")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Script(String),
    Native(PluginFactory),
}

#[derive(Debug, Clone)]
pub struct LoadedDependency {
    pub reference: ModuleReference,
    pub candidate: ResolutionCandidate,
    pub payload: Payload,
}

/// Every dependency of one program, in import order.
#[derive(Debug, Clone, Default)]
pub struct DependencySet {
    items: Vec<LoadedDependency>,
}

impl DependencySet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadedDependency> {
        self.items.iter()
    }

    /// Script sources keyed by the location they were read from.
    pub fn scripts(&self) -> impl Iterator<Item = (&Location, &str)> {
        self.items.iter().filter_map(|dep| match &dep.payload {
            Payload::Script(text) => Some((&dep.candidate.location, text.as_str())),
            Payload::Native(_) => None,
        })
    }

    /// Loaded native factories; packaging consumes this list.
    pub fn native_modules(&self) -> impl Iterator<Item = (&Location, &PluginFactory)> {
        self.items.iter().filter_map(|dep| match &dep.payload {
            Payload::Native(factory) => Some((&dep.candidate.location, factory)),
            Payload::Script(_) => None,
        })
    }
}

pub struct AsyncLoader {
    fetcher: Arc<dyn RemoteFetch>,
    code_loader: Arc<dyn CodeLoader>,
    staging: Arc<RemoteStagingCache>,
}

impl AsyncLoader {
    pub fn new(config: &LoaderConfig, code_loader: Arc<dyn CodeLoader>) -> Self {
        Self::with_fetcher(
            Arc::new(HttpFetcher::new(config)),
            code_loader,
            Arc::new(RemoteStagingCache::new(&config.staging_dir)),
        )
    }

    pub fn with_fetcher(
        fetcher: Arc<dyn RemoteFetch>,
        code_loader: Arc<dyn CodeLoader>,
        staging: Arc<RemoteStagingCache>,
    ) -> Self {
        Self {
            fetcher,
            code_loader,
            staging,
        }
    }

    pub fn staging(&self) -> &RemoteStagingCache {
        &self.staging
    }

    pub fn load_script_library(
        &self,
        reference: &ModuleReference,
        location: &Location,
    ) -> LoaderTask<String> {
        let owner = reference.clone();
        match location.clone() {
            Location::Remote(url) => {
                let fetcher = Arc::clone(&self.fetcher);
                LoaderTask::new(reference.clone(), async move {
                    tracing::debug!(%url, "fetching script library");
                    fetcher
                        .fetch_text(&url)
                        .await
                        .map_err(|failure| fetch_error(&owner, url.clone(), failure))
                })
            }
            Location::Local(path) => LoaderTask::new(reference.clone(), async move {
                let exists = tokio::fs::metadata(&path)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false);
                if !exists {
                    return Err(read_error(&owner, path, "file does not exist".into()));
                }
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|err| read_error(&owner, path.clone(), err.to_string()))
            }),
        }
    }

    pub fn load_native_module(
        &self,
        reference: &ModuleReference,
        location: &Location,
    ) -> LoaderTask<PluginFactory> {
        let owner = reference.clone();
        let code_loader = Arc::clone(&self.code_loader);
        match location.clone() {
            Location::Remote(url) => {
                let fetcher = Arc::clone(&self.fetcher);
                let staging = Arc::clone(&self.staging);
                LoaderTask::new(reference.clone(), async move {
                    tracing::debug!(%url, "fetching native module");
                    let bytes = fetcher
                        .fetch_bytes(&url)
                        .await
                        .map_err(|failure| fetch_error(&owner, url.clone(), failure))?;
                    let staged = staging.stage(&url, &bytes).await.map_err(|source| {
                        error_for(
                            &owner,
                            ImportErrorKind::StagingWrite {
                                url: url.clone(),
                                path: staging.staging_path(&url),
                                source,
                            },
                        )
                    })?;
                    load_code(code_loader.as_ref(), &owner, staged).await
                })
            }
            Location::Local(path) => LoaderTask::new(reference.clone(), async move {
                load_code(code_loader.as_ref(), &owner, path).await
            }),
        }
    }

    /// Task for a candidate of either kind.
    pub fn task_for(
        &self,
        reference: &ModuleReference,
        candidate: &ResolutionCandidate,
    ) -> LoaderTask<Payload> {
        match candidate.kind {
            ModuleKind::ScriptLibrary => self
                .load_script_library(reference, &candidate.location)
                .map(Payload::Script),
            ModuleKind::NativeModule => self
                .load_native_module(reference, &candidate.location)
                .map(Payload::Native),
        }
    }

    /// Load a whole batch. Either every dependency is returned, in input
    /// order, or the first error observed is.
    pub async fn load_batch(
        &self,
        resolved: Vec<(ModuleReference, ResolutionCandidate)>,
    ) -> Result<DependencySet, ImportError> {
        let tasks: Vec<_> = resolved
            .iter()
            .map(|(reference, candidate)| self.task_for(reference, candidate))
            .collect();
        let payloads = join_all(tasks).await?;
        let items: Vec<_> = resolved
            .into_iter()
            .zip(payloads)
            .map(|((reference, candidate), payload)| LoadedDependency {
                reference,
                candidate,
                payload,
            })
            .collect();
        tracing::info!(count = items.len(), "dependencies loaded");
        Ok(DependencySet { items })
    }
}

impl std::fmt::Debug for AsyncLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncLoader")
            .field("staging", &self.staging)
            .finish_non_exhaustive()
    }
}

/// Run every task concurrently. The first failure aborts the rest.
pub async fn join_all<T: Send + 'static>(tasks: Vec<LoaderTask<T>>) -> Result<Vec<T>, ImportError> {
    let total = tasks.len();
    let mut set = JoinSet::new();
    let mut owners = HashMap::with_capacity(total);
    for (index, task) in tasks.into_iter().enumerate() {
        let owner = task.reference.clone();
        let handle = set.spawn(async move { (index, task.run().await) });
        owners.insert(handle.id(), owner);
    }

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next_with_id().await {
        match joined {
            Ok((_, (index, Ok(value)))) => slots[index] = Some(value),
            Ok((_, (_, Err(err)))) => {
                tracing::warn!(error = %err, "dependency failed, aborting batch");
                set.abort_all();
                return Err(err);
            }
            Err(join_err) => {
                set.abort_all();
                let kind = ImportErrorKind::Aborted(join_err.to_string());
                let err = match owners.get(&join_err.id()) {
                    Some(owner) => error_for(owner, kind),
                    None => ImportError::new(kind, None, 0),
                };
                tracing::warn!(error = %err, "dependency task did not complete");
                return Err(err);
            }
        }
    }
    Ok(slots.into_iter().flatten().collect())
}

async fn load_code(
    code_loader: &dyn CodeLoader,
    owner: &ModuleReference,
    path: PathBuf,
) -> Result<PluginFactory, ImportError> {
    tracing::debug!(path = %path.display(), "loading native module");
    code_loader
        .load_code(&path)
        .await
        .map_err(|source| error_for(owner, ImportErrorKind::DynamicLoad { path, source }))
}

fn error_for(owner: &ModuleReference, kind: ImportErrorKind) -> ImportError {
    ImportError::new(kind, owner.origin(), owner.origin_line)
}

fn fetch_error(owner: &ModuleReference, url: String, failure: FetchFailure) -> ImportError {
    tracing::warn!(%url, %failure, "download failed");
    error_for(
        owner,
        ImportErrorKind::Fetch {
            url,
            status: failure.status,
            reason: failure.reason,
        },
    )
}

fn read_error(owner: &ModuleReference, path: PathBuf, reason: String) -> ImportError {
    error_for(owner, ImportErrorKind::Read { path, reason })
}
