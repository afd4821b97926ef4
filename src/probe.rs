use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Untouched,
    Verifying,
    Verified,
    Failed,
}

/// Resolves whether a URL points at a loadable image. Never errors;
/// anything short of a usable image is `false`.
pub trait ImageProbe {
    // Returns a named Send future so the verifier can spawn it.
    fn probe(&self, url: &str) -> impl Future<Output = bool> + Send;
}

#[derive(Clone, Default)]
pub struct HttpImageProbe {
    client: Client,
}

impl HttpImageProbe {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl ImageProbe for HttpImageProbe {
    fn probe(&self, url: &str) -> impl Future<Output = bool> + Send {
        let response = self.client.get(url).send();
        async move {
            match response.await {
                Ok(response) => {
                    let image_body = response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .map(|value| value.starts_with("image/"))
                        .unwrap_or(false);
                    response.status().is_success() && image_body
                }
                Err(_) => false,
            }
        }
    }
}

/// Tracks one URL field through `Untouched → Verifying → {Verified |
/// Failed}`. Each edit restarts the check after a settling delay; a
/// check that was superseded mid-flight discards its result instead of
/// overwriting the newer state.
pub struct UrlVerifier<P> {
    inner: Arc<VerifierInner<P>>,
}

struct VerifierInner<P> {
    probe: P,
    settle: Duration,
    // Generation of the state now published. Held across every publish
    // so a check's landing and a newer edit cannot interleave.
    latest: Mutex<u64>,
    state: watch::Sender<Verification>,
}

impl<P> Clone for UrlVerifier<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> UrlVerifier<P>
where
    P: ImageProbe + Send + Sync + 'static,
{
    pub const SETTLE: Duration = Duration::from_millis(300);

    pub fn new(probe: P) -> Self {
        Self::with_settle(probe, Self::SETTLE)
    }

    pub fn with_settle(probe: P, settle: Duration) -> Self {
        let (state, _) = watch::channel(Verification::Untouched);
        Self {
            inner: Arc::new(VerifierInner {
                probe,
                settle,
                latest: Mutex::new(0),
                state,
            }),
        }
    }

    pub fn state(&self) -> Verification {
        *self.inner.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<Verification> {
        self.inner.state.subscribe()
    }

    /// Call on every edit of the URL field. Must run inside a tokio
    /// runtime; the check itself happens on a spawned task.
    pub fn url_changed(&self, url: &str) {
        let url = url.trim().to_owned();
        let generation = {
            let mut latest = self.inner.latest.lock().expect("verifier lock poisoned");
            *latest += 1;
            self.inner.state.send_replace(if url.is_empty() {
                Verification::Untouched
            } else {
                Verification::Verifying
            });
            *latest
        };
        if url.is_empty() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.settle).await;
            if *inner.latest.lock().expect("verifier lock poisoned") != generation {
                return;
            }
            let loadable = inner.probe.probe(&url).await;
            // Landing under the same lock that hands out generations: a
            // newer edit either published first or sees this result gone.
            let latest = inner.latest.lock().expect("verifier lock poisoned");
            if *latest != generation {
                debug!(url, "discarding stale image check");
                return;
            }
            inner.state.send_replace(if loadable {
                Verification::Verified
            } else {
                Verification::Failed
            });
        });
    }
}
