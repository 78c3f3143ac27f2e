//=====================================================
// File: loader/fetch.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Remote download capability for script libraries and plugins
// Objective: Wrap the blocking ureq agent so downloads run as async tasks
//=====================================================

use crate::config::LoaderConfig;
use async_trait::async_trait;
use std::fmt;
use std::io::Read;
use ureq::{Agent, AgentBuilder};

/// Why a download failed. `status` is set for non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub status: Option<u16>,
    pub reason: String,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "{code} {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

#[async_trait]
pub trait RemoteFetch: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure>;
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchFailure>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: Agent,
}

impl HttpFetcher {
    pub fn new(config: &LoaderConfig) -> Self {
        let mut builder = AgentBuilder::new().user_agent(&config.user_agent);
        if let Some(timeout) = config.fetch_timeout() {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
        }
    }

    async fn get<T, F>(&self, url: &str, read: F) -> Result<T, FetchFailure>
    where
        T: Send + 'static,
        F: FnOnce(ureq::Response) -> std::io::Result<T> + Send + 'static,
    {
        let agent = self.agent.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || {
            let response = agent.get(&url).call().map_err(failure_from)?;
            read(response).map_err(|err| FetchFailure {
                status: None,
                reason: err.to_string(),
            })
        })
        .await
        .map_err(|err| FetchFailure {
            status: None,
            reason: err.to_string(),
        })?
    }
}

fn failure_from(err: ureq::Error) -> FetchFailure {
    match err {
        ureq::Error::Status(code, response) => FetchFailure {
            status: Some(code),
            reason: response.status_text().to_string(),
        },
        ureq::Error::Transport(transport) => FetchFailure {
            status: None,
            reason: transport.to_string(),
        },
    }
}

#[async_trait]
impl RemoteFetch for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure> {
        self.get(url, |response| response.into_string()).await
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        self.get(url, |response| {
            let mut body = Vec::new();
            response.into_reader().read_to_end(&mut body)?;
            Ok(body)
        })
        .await
    }
}
