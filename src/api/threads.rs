use crate::auth::TokenProvider;
use crate::config::Config;
use crate::types::ThreadRef;
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub const THREADS_PATH: &str = "/api/v1/chat/threads";

/// Storage behind the thread list.
pub trait ThreadBackend: Send + Sync {
    fn list_threads(&self) -> BoxFuture<'_, Result<Vec<ThreadRef>>>;
    fn create_thread(&self) -> BoxFuture<'_, Result<ThreadRef>>;
    fn delete_thread<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>>;
}

pub struct HttpThreadBackend {
    http: reqwest::Client,
    api_url: String,
    auth: Arc<dyn TokenProvider>,
}

impl HttpThreadBackend {
    pub fn new(config: &Config, auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self
            .auth
            .token()
            .ok_or_else(|| anyhow!("no access token available for the thread API"))?;
        Ok(builder.bearer_auth(token))
    }

    fn threads_url(&self) -> String {
        format!("{}{}", self.api_url, THREADS_PATH)
    }
}

impl ThreadBackend for HttpThreadBackend {
    fn list_threads(&self) -> BoxFuture<'_, Result<Vec<ThreadRef>>> {
        Box::pin(async move {
            let url = self.threads_url();
            let threads = self
                .authorized(self.http.get(&url))?
                .send()
                .await
                .with_context(|| format!("GET {url} failed"))?
                .error_for_status()?
                .json::<Vec<ThreadRef>>()
                .await
                .context("thread list response was not a list of threads")?;
            Ok(threads)
        })
    }

    fn create_thread(&self) -> BoxFuture<'_, Result<ThreadRef>> {
        Box::pin(async move {
            let url = self.threads_url();
            let thread = self
                .authorized(self.http.post(&url))?
                .json(&serde_json::json!({}))
                .send()
                .await
                .with_context(|| format!("POST {url} failed"))?
                .error_for_status()?
                .json::<ThreadRef>()
                .await
                .context("create thread response had no id")?;
            Ok(thread)
        })
    }

    fn delete_thread<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let url = format!("{}/{}", self.threads_url(), id);
            self.authorized(self.http.delete(&url))?
                .send()
                .await
                .with_context(|| format!("DELETE {url} failed"))?
                .error_for_status()?;
            Ok(())
        })
    }
}

/// Process-local thread store, used offline and in tests.
#[derive(Default)]
pub struct InMemoryThreadBackend {
    threads: Mutex<Vec<ThreadRef>>,
    next_id: Mutex<u64>,
}

impl InMemoryThreadBackend {
    pub fn with_threads(threads: Vec<ThreadRef>) -> Self {
        Self {
            threads: Mutex::new(threads),
            next_id: Mutex::new(0),
        }
    }

    /// Sets the title of an existing thread, as a server would after the
    /// first answer.
    pub fn set_title(&self, id: &str, title: &str) {
        if let Ok(mut threads) = self.threads.lock() {
            if let Some(thread) = threads.iter_mut().find(|thread| thread.id == id) {
                thread.title = Some(title.to_string());
            }
        }
    }

    fn insert_new_thread(&self) -> Result<ThreadRef> {
        let mut next_id = self.next_id.lock().map_err(|_| anyhow!("thread store poisoned"))?;
        let mut threads = self.threads.lock().map_err(|_| anyhow!("thread store poisoned"))?;
        *next_id += 1;
        let thread = ThreadRef {
            id: format!("thread-{next_id}"),
            title: None,
        };
        threads.insert(0, thread.clone());
        Ok(thread)
    }
}

impl ThreadBackend for InMemoryThreadBackend {
    fn list_threads(&self) -> BoxFuture<'_, Result<Vec<ThreadRef>>> {
        let threads = self
            .threads
            .lock()
            .map(|threads| threads.clone())
            .map_err(|_| anyhow!("thread store poisoned"));
        Box::pin(async move { threads })
    }

    fn create_thread(&self) -> BoxFuture<'_, Result<ThreadRef>> {
        let created = self.insert_new_thread();
        Box::pin(async move { created })
    }

    fn delete_thread<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<()>> {
        let deleted = self
            .threads
            .lock()
            .map_err(|_| anyhow!("thread store poisoned"))
            .and_then(|mut threads| {
                let before = threads.len();
                threads.retain(|thread| thread.id != id);
                if threads.len() == before {
                    Err(anyhow!("thread '{id}' not found"))
                } else {
                    Ok(())
                }
            });
        Box::pin(async move { deleted })
    }
}

/// Lists, creates and deletes threads, and publishes the latest list to
/// subscribers after every change.
pub struct ThreadDirectory {
    backend: Arc<dyn ThreadBackend>,
    threads_tx: watch::Sender<Vec<ThreadRef>>,
}

impl ThreadDirectory {
    pub fn new(backend: Arc<dyn ThreadBackend>) -> Self {
        let (threads_tx, _) = watch::channel(Vec::new());
        Self {
            backend,
            threads_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ThreadRef>> {
        self.threads_tx.subscribe()
    }

    /// Last published list, without a round trip.
    pub fn cached(&self) -> Vec<ThreadRef> {
        self.threads_tx.borrow().clone()
    }

    pub async fn list_threads(&self) -> Result<Vec<ThreadRef>> {
        let threads = self.backend.list_threads().await?;
        self.threads_tx.send_replace(threads.clone());
        Ok(threads)
    }

    pub async fn refresh(&self) -> Result<()> {
        let threads = self.list_threads().await?;
        tracing::debug!(count = threads.len(), "thread list refreshed");
        Ok(())
    }

    pub async fn create_thread(&self) -> Result<ThreadRef> {
        let thread = self.backend.create_thread().await?;
        self.refresh().await?;
        Ok(thread)
    }

    pub async fn delete_thread(&self, id: &str) -> Result<()> {
        self.backend.delete_thread(id).await?;
        self.refresh().await
    }
}
