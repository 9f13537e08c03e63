//! Generic REST client that dispatches requests onto a tokio runtime and
//! reports each outcome to a single-shot handler.

use std::{collections::BTreeMap, marker::PhantomData, sync::Arc, time::Duration};

use serde::{
    Serialize,
    de::{DeserializeOwned, IgnoredAny},
};
use tokio::{runtime::Handle, sync::oneshot, task::JoinHandle};

use crate::adapter::{
    ReqwestTransport, RestError, RestRequest, RestResponse, RestResult, RestTransport,
    SharedRestTransport,
};

/// Headers attached to every request, keyed by header name.
pub type HeaderSet = BTreeMap<String, String>;

/// Handle to an in-flight request.
///
/// Dropping it leaves the request running; only [`Cancellable::cancel`] stops it.
#[derive(Debug)]
pub struct Cancellable {
    cancel_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Cancellable {
    /// Asks the request to stop. Returns `false` when the request had already
    /// completed or was cancelled before; the handler is not called twice.
    pub fn cancel(&mut self) -> bool {
        match self.cancel_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the handler has run. A panic raised by the handler resumes
    /// in the caller.
    pub async fn wait(self) {
        if let Err(err) = self.task.await {
            if err.is_panic() {
                std::panic::resume_unwind(err.into_panic());
            }
        }
    }
}

#[derive(Clone)]
pub struct RestClient {
    transport: Arc<SharedRestTransport>,
    headers: Arc<HeaderSet>,
    timeout: Option<Duration>,
    runtime: Handle,
}

impl RestClient {
    /// Client over the default reqwest transport.
    pub fn new(runtime: Handle, headers: HeaderSet) -> Self {
        Self::with_transport(ReqwestTransport::new(), runtime, headers)
    }

    pub fn with_transport<T>(transport: T, runtime: Handle, headers: HeaderSet) -> Self
    where
        T: RestTransport + 'static,
    {
        Self {
            transport: Arc::new(transport),
            headers: Arc::new(headers),
            timeout: None,
            runtime,
        }
    }

    /// Applies `timeout` to every request sent by this client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sends `request` with the stored headers and waits for the raw response.
    pub async fn execute(&self, request: RestRequest) -> RestResult<RestResponse> {
        let request = self.prepare(request);
        self.transport.execute(request).await
    }

    /// GET `url`, decoding a single JSON value.
    pub fn get<T, F>(&self, url: impl Into<String>, handler: F) -> Cancellable
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<T>) + Send + 'static,
    {
        self.dispatch(Ok(RestRequest::get(url)), handler)
    }

    /// GET `url`, decoding a JSON array.
    pub fn get_all<T, F>(&self, url: impl Into<String>, handler: F) -> Cancellable
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<Vec<T>>) + Send + 'static,
    {
        self.dispatch(Ok(RestRequest::get(url)), handler)
    }

    pub fn delete<T, F>(&self, url: impl Into<String>, handler: F) -> Cancellable
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<T>) + Send + 'static,
    {
        self.dispatch(Ok(RestRequest::delete(url)), handler)
    }

    /// POST `url` without a body.
    pub fn post<T, F>(&self, url: impl Into<String>, handler: F) -> Cancellable
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<T>) + Send + 'static,
    {
        self.dispatch(Ok(RestRequest::post(url)), handler)
    }

    /// POST `url` with `body` encoded as JSON. An encoding failure is reported
    /// to `handler` and nothing is sent.
    pub fn post_json<B, T, F>(&self, url: impl Into<String>, body: &B, handler: F) -> Cancellable
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<T>) + Send + 'static,
    {
        self.dispatch(RestRequest::post(url).with_json(body), handler)
    }

    /// PUT `url` with `body` encoded as JSON. Nobody observes the outcome, so
    /// failures are only logged.
    pub fn put<B>(&self, url: impl Into<String>, body: &B) -> Cancellable
    where
        B: Serialize + ?Sized,
    {
        self.send_detached(RestRequest::put(url).with_json(body))
    }

    /// Sends a request built by the caller. An `Err` goes straight to
    /// `handler` and the transport is never called.
    pub fn send<T, F>(&self, request: RestResult<RestRequest>, handler: F) -> Cancellable
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<T>) + Send + 'static,
    {
        self.dispatch(request, handler)
    }

    /// Like [`RestClient::send`], but the outcome is only logged.
    pub fn send_detached(&self, request: RestResult<RestRequest>) -> Cancellable {
        let url = request
            .as_ref()
            .map(|request| request.url.clone())
            .unwrap_or_default();
        self.dispatch(request, move |result: RestResult<IgnoredAny>| {
            if let Err(err) = result {
                tracing::warn!(url = %url, error = %err, "unobserved request failed");
            }
        })
    }

    fn prepare(&self, mut request: RestRequest) -> RestRequest {
        for (name, value) in self.headers.iter() {
            request = request.with_header(name.clone(), value.clone());
        }
        if let (None, Some(timeout)) = (request.timeout, self.timeout) {
            request = request.with_timeout(timeout);
        }
        request
    }

    fn dispatch<T, F>(&self, request: RestResult<RestRequest>, handler: F) -> Cancellable
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(RestResult<T>) + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let request = request.map(|request| self.prepare(request));
        let url = request
            .as_ref()
            .map(|request| request.url.clone())
            .unwrap_or_default();
        let handler = HandlerSlot::new(handler, url);
        let transport = Arc::clone(&self.transport);

        let task = self.runtime.spawn(async move {
            let request = match request {
                Ok(request) => request,
                Err(err) => return handler.complete(Err(err)),
            };
            let method = request.method.clone();
            let url = request.url.clone();
            tracing::debug!(method = %method, url = %url, "dispatching request");

            let outcome = tokio::select! {
                biased;
                Ok(()) = &mut cancel_rx => {
                    tracing::trace!(method = %method, url = %url, "request cancelled");
                    Err(RestError::cancelled(&url))
                }
                result = transport.execute(request) => result.and_then(|response| {
                    tracing::debug!(
                        method = %method,
                        url = %url,
                        status = response.status,
                        elapsed_ms = response.elapsed.as_millis() as u64,
                        "request completed"
                    );
                    response.error_for_status()?.json::<T>()
                }),
            };

            // After the close every `cancel()` returns false. A signal that
            // landed before it still turns the outcome into `Cancelled`.
            cancel_rx.close();
            let outcome = match cancel_rx.try_recv() {
                Ok(()) => Err(RestError::cancelled(&url)),
                Err(_) => outcome,
            };
            handler.complete(outcome);
        });

        Cancellable {
            cancel_tx: Some(cancel_tx),
            task,
        }
    }
}

/// Holds a handler until it runs. If the request task is dropped first, as
/// happens when its runtime shuts down, the handler receives `Cancelled`.
struct HandlerSlot<T, F>
where
    F: FnOnce(RestResult<T>),
{
    handler: Option<F>,
    url: String,
    _result: PhantomData<fn(RestResult<T>)>,
}

impl<T, F> HandlerSlot<T, F>
where
    F: FnOnce(RestResult<T>),
{
    fn new(handler: F, url: String) -> Self {
        Self {
            handler: Some(handler),
            url,
            _result: PhantomData,
        }
    }

    fn complete(mut self, outcome: RestResult<T>) {
        if let Some(handler) = self.handler.take() {
            handler(outcome);
        }
    }
}

impl<T, F> Drop for HandlerSlot<T, F>
where
    F: FnOnce(RestResult<T>),
{
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            tracing::debug!(url = %self.url, "request dropped before completion");
            handler(Err(RestError::cancelled(&self.url)));
        }
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("header_names", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
