//! Debounced rendering session.
//!
//! Rapid edits are coalesced: every request bumps a generation counter and
//! waits out the debounce period, and only the latest generation renders.
//! A render that finishes after a newer request started is discarded. The
//! output is a `watch` channel holding the whole composed frame, so readers
//! only ever see complete frames (`None` means the surface is cleared).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::assets::AssetFetcher;
use crate::config::{RenderConfig, RenderOptions};
use crate::error::Result;
use crate::pipeline::{render_frame, Frame};

/// Published output: the current frame, or `None` for a cleared surface.
pub type Output = Option<Arc<Frame>>;

/// What became of a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The frame of this generation was published.
    Applied(u64),
    /// Empty payload: the output was cleared.
    Cleared,
    /// A newer request arrived first; nothing was published.
    Superseded,
}

struct Inner<F> {
    fetcher: F,
    options: RenderOptions,
    generation: AtomicU64,
    output: watch::Sender<Output>,
}

impl<F> Inner<F> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Owns the output surface and serializes renders into it.
pub struct Renderer<F> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for Renderer<F> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<F: AssetFetcher + 'static> Renderer<F> {
    pub fn new(fetcher: F, options: RenderOptions) -> Result<Self> {
        options.validate()?;
        let (output, _) = watch::channel(None);
        Ok(Self {
            inner: Arc::new(Inner {
                fetcher,
                options,
                generation: AtomicU64::new(0),
                output,
            }),
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.inner.options
    }

    /// Receives every published frame.
    pub fn subscribe(&self) -> watch::Receiver<Output> {
        self.inner.output.subscribe()
    }

    /// The last published frame.
    pub fn current(&self) -> Output {
        self.inner.output.borrow().clone()
    }

    /// Schedules a render after the debounce period.
    ///
    /// Requests made within the period supersede this one.
    pub fn request(&self, config: RenderConfig) -> JoinHandle<Result<RenderStatus>> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let debounce = Duration::from_millis(self.inner.options.debounce_ms);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if !inner.is_current(generation) {
                tracing::debug!(generation, "render coalesced into a newer request");
                return Ok(RenderStatus::Superseded);
            }
            run(&inner, generation, config).await
        })
    }

    /// Renders immediately, superseding anything pending.
    pub async fn render_now(&self, config: RenderConfig) -> Result<RenderStatus> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        run(&self.inner, generation, config).await
    }
}

async fn run<F: AssetFetcher>(
    inner: &Inner<F>,
    generation: u64,
    config: RenderConfig,
) -> Result<RenderStatus> {
    let rendered = render_frame(&inner.fetcher, &inner.options, &config).await;
    if !inner.is_current(generation) {
        tracing::debug!(generation, "discarding overtaken render");
        return Ok(RenderStatus::Superseded);
    }
    match rendered {
        Ok(Some(frame)) => {
            inner.output.send_replace(Some(Arc::new(frame)));
            tracing::debug!(generation, "published frame");
            Ok(RenderStatus::Applied(generation))
        }
        Ok(None) => {
            inner.output.send_replace(None);
            Ok(RenderStatus::Cleared)
        }
        Err(err) => {
            inner.output.send_replace(None);
            Err(err)
        }
    }
}
