//! Process runner with graceful shutdown.
//!
//! Runs long-lived app processes concurrently, cancels them all on
//! SIGTERM/SIGINT or on the first process failure, then executes cleanup
//! closers under a timeout. Processes receive a `CancellationToken` and
//! are expected to finish their in-flight work before returning.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A long-running app process: takes the shutdown token, resolves when
/// the process has fully stopped.
pub type AppProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>
        + Send,
>;

/// A cleanup function executed after all processes have stopped.
pub type Closer =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>> + Send>;

pub struct Runner {
    app_processes: Vec<AppProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Add an app process. If any process returns an error, the token is
    /// cancelled and the remaining processes shut down.
    pub fn with_app_process<F, Fut>(mut self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.app_processes
            .push(Box::new(|token| Box::pin(process(token))));
        self
    }

    /// Add a closer. Closers run after the processes stop, regardless of
    /// why they stopped; all of them are attempted even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Use an externally-owned cancellation token instead of the default.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Run all processes until completion, failure, or a shutdown signal,
    /// then execute the closers and exit the process.
    pub async fn run(self) {
        let token = Arc::new(self.cancellation_token);
        let closer_timeout = self.closer_timeout;
        let closers = self.closers;

        let mut join_set = JoinSet::new();
        for process in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move { process((*process_token).clone()).await });
        }

        Self::spawn_signal_handlers(token.clone());

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    tracing::debug!("App process completed");
                }
                Ok(Err(err)) => {
                    if !token.is_cancelled() {
                        tracing::error!("App process error: {:#}", err);
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    tracing::error!("App process panicked: {}", err);
                    if !token.is_cancelled() {
                        token.cancel();
                    }
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        // Cancelled processes observe the token and finish their in-flight
        // work before returning; wait for them rather than aborting.
        while let Some(result) = join_set.join_next().await {
            if let Ok(Err(err)) = result {
                tracing::error!("App process error during shutdown: {:#}", err);
            }
        }

        if !closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", closer_timeout);
            match tokio::time::timeout(closer_timeout, Self::run_closers(closers)).await {
                Ok(_) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", closer_timeout),
            }
        }

        if let Some(err) = first_error {
            tracing::error!("Exiting with error: {:#}", err);
            std::process::exit(1);
        } else {
            tracing::info!("Exiting normally");
            std::process::exit(0);
        }
    }

    fn spawn_signal_handlers(token: Arc<CancellationToken>) {
        let ctrl_c_token = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received shutdown signal");
                    ctrl_c_token.cancel();
                }
                Err(err) => {
                    tracing::error!("Error setting up signal handler: {}", err);
                }
            }
        });

        #[cfg(unix)]
        {
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                        tracing::info!("Received SIGTERM signal");
                        token.cancel();
                    }
                    Err(err) => {
                        tracing::error!("Error setting up SIGTERM handler: {}", err);
                    }
                }
            });
        }
    }

    async fn run_closers(closers: Vec<Closer>) {
        let mut closer_set = JoinSet::new();
        for closer in closers {
            closer_set.spawn(async move { closer().await });
        }

        while let Some(result) = closer_set.join_next().await {
            match result {
                Ok(Ok(())) => tracing::debug!("Closer completed"),
                Ok(Err(err)) => tracing::error!("Closer error: {:#}", err),
                Err(err) => tracing::error!("Closer panicked: {}", err),
            }
        }
    }
}
