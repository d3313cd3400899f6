//! Asynchronous client for the typograf SOAP service.
//!
//! # Design
//! `TypografClient` owns a `Transport` (the shared connection pool) and a
//! `ResponseExtractor`. Each call is split the same way the wire exchange
//! is: `build_request` renders the SOAP envelope into an `HttpRequest`, and
//! `parse_response` resolves whatever the transport reported into an
//! `OperationOutcome`. `process_text` glues the two around a spawned task and
//! hands the outcome to the caller's callback exactly once.
//!
//! Cancellation races the transport. Whichever resolves first wins; a late
//! cancel after the transport already produced a response has no effect.

use std::fmt;
use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::cancel::{raised, CancellationHandle};
use crate::error::{ClientError, TypografError};
use crate::extract::{PatternExtractor, ResponseExtractor};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::resources::{localized_string, PROCESS_TEXT_PATTERN_KEY, SOAP_TABLE};
use crate::transport::{ReqwestTransport, Transport, TransportError};
use crate::types::{OperationOutcome, ProcessTextParameters};

/// Endpoint of the public typograf web service.
pub const DEFAULT_ENDPOINT: &str = "http://typograf.artlebedev.ru/webservices/typograf.asmx";

/// Content type of every request body.
pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// Where to send requests and how to find the result in responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub response_pattern: String,
}

impl ClientConfig {
    /// Default endpoint plus the extraction pattern from the bundled SOAP table.
    pub fn from_resources() -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            response_pattern: localized_string(SOAP_TABLE, PROCESS_TEXT_PATTERN_KEY)?,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Client for the typograf `ProcessText` operation.
///
/// Calls run on the Tokio runtime captured at construction, so
/// `process_text` may be invoked from any thread. Dropping the client cancels
/// every call still in flight; those calls resolve to
/// `OperationOutcome::Cancelled`.
pub struct TypografClient {
    endpoint: String,
    runtime: Handle,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn ResponseExtractor>,
    shutdown: watch::Sender<bool>,
}

impl TypografClient {
    /// Client for the public service using a fresh reqwest pool.
    ///
    /// Must be called from within a Tokio runtime; use `from_parts` to pass a
    /// runtime handle explicitly.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::from_resources()?)
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()?))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ClientError> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let extractor = PatternExtractor::new(&config.response_pattern)?;
        tracing::debug!(
            endpoint = %config.endpoint,
            pattern = extractor.as_str(),
            "typograf client configured"
        );
        Ok(Self::from_parts(
            config.endpoint,
            transport,
            Arc::new(extractor),
            runtime,
        ))
    }

    /// Assemble a client from its parts; calls are spawned onto `runtime`.
    pub fn from_parts(
        endpoint: impl Into<String>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn ResponseExtractor>,
        runtime: Handle,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            endpoint: endpoint.into(),
            runtime,
            transport,
            extractor,
            shutdown,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn build_request(&self, parameters: &ProcessTextParameters, text: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: self.endpoint.clone(),
            headers: vec![("Content-Type".to_string(), SOAP_CONTENT_TYPE.to_string())],
            body: Some(parameters.request_body(text)),
        }
    }

    /// Resolve a transport result into the outcome delivered to callers.
    pub fn parse_response(
        &self,
        result: Result<HttpResponse, TransportError>,
    ) -> OperationOutcome {
        resolve(self.extractor.as_ref(), result)
    }

    /// Send `text` to the service and report the outcome to `on_complete`.
    ///
    /// Returns immediately, from any thread. `on_complete` runs exactly once
    /// on a worker of the client's runtime, with `OperationOutcome::Cancelled`
    /// if the returned handle (or dropping the client) cancelled the call
    /// before the transport answered.
    pub fn process_text<F>(
        &self,
        parameters: &ProcessTextParameters,
        text: &str,
        on_complete: F,
    ) -> CancellationHandle
    where
        F: FnOnce(OperationOutcome) + Send + 'static,
    {
        let request = self.build_request(parameters, text);
        let (handle, cancel) = CancellationHandle::new();
        let shutdown = self.shutdown.subscribe();
        let transport = Arc::clone(&self.transport);
        let extractor = Arc::clone(&self.extractor);

        tracing::debug!(
            method = request.method.as_str(),
            endpoint = %request.url,
            text_len = text.len(),
            "dispatching typograf request"
        );

        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = cancelled(cancel, shutdown) => {
                    tracing::debug!("typograf request cancelled before response");
                    OperationOutcome::Cancelled
                }
                result = transport.execute(request) => resolve(extractor.as_ref(), result),
            };
            on_complete(outcome);
        });

        handle
    }
}

impl fmt::Debug for TypografClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypografClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl Drop for TypografClient {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Completes when either the call's handle or the owning client cancels.
async fn cancelled(call: watch::Receiver<bool>, shutdown: watch::Receiver<bool>) {
    tokio::select! {
        true = raised(call) => {}
        true = raised(shutdown) => {}
        else => std::future::pending::<()>().await,
    }
}

fn resolve(
    extractor: &dyn ResponseExtractor,
    result: Result<HttpResponse, TransportError>,
) -> OperationOutcome {
    let response = match result {
        Ok(response) => response,
        Err(TransportError::Cancelled) => return OperationOutcome::Cancelled,
        Err(TransportError::Network(detail)) => {
            tracing::warn!(%detail, "typograf request failed");
            return OperationOutcome::Failure(TypografError::Response(detail));
        }
    };

    if !response.is_success() || response.body.is_empty() {
        tracing::warn!(
            status = response.status,
            body_len = response.body.len(),
            "typograf service unavailable"
        );
        return OperationOutcome::Failure(TypografError::ServiceUnavailable);
    }

    // a byte-order mark overrides the declared charset
    let (encoding, body) = match Encoding::for_bom(&response.body) {
        Some((encoding, bom_len)) => (encoding, &response.body[bom_len..]),
        None => {
            let declared = response
                .charset()
                .and_then(|label| Encoding::for_label(label.as_bytes()))
                .unwrap_or(UTF_8);
            (declared, response.body.as_slice())
        }
    };

    let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) else {
        tracing::warn!(encoding = encoding.name(), "typograf response is not valid text");
        return OperationOutcome::Failure(TypografError::InvalidResponseData);
    };

    match extractor.extract(&text) {
        Some(result) => {
            tracing::debug!(result_len = result.len(), "typograf request succeeded");
            OperationOutcome::Success(result)
        }
        None => {
            tracing::warn!("typograf response did not contain a result");
            OperationOutcome::Failure(TypografError::InvalidResponseData)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::types::EntityType;

    const ENDPOINT: &str = "http://localhost:3000/webservices/typograf.asmx";

    /// Answers every request with the same canned result and records requests.
    struct ScriptedTransport {
        result: Result<HttpResponse, TransportError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(result: Result<HttpResponse, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.result.clone()
        }
    }

    /// Never answers.
    struct PendingTransport;

    #[async_trait]
    impl Transport for PendingTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            std::future::pending().await
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::from_resources().unwrap().with_endpoint(ENDPOINT)
    }

    fn client(transport: Arc<dyn Transport>) -> TypografClient {
        TypografClient::with_transport(config(), transport).unwrap()
    }

    fn soap_ok(inner: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![(
                "content-type".to_string(),
                "application/soap+xml; charset=utf-8".to_string(),
            )],
            body: format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?><soap:Envelope><soap:Body>\
                 <ProcessTextResponse><ProcessTextResult>{inner}</ProcessTextResult>\
                 </ProcessTextResponse></soap:Body></soap:Envelope>"
            )
            .into_bytes(),
        }
    }

    async fn run(client: &TypografClient, text: &str) -> OperationOutcome {
        let (tx, rx) = oneshot::channel();
        let _handle = client.process_text(&ProcessTextParameters::default(), text, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn build_request_produces_soap_post() {
        let c = client(Arc::new(PendingTransport));
        let params = ProcessTextParameters::new(EntityType::Html, 3, true, true);
        let req = c.build_request(&params, "a & b");
        assert_eq!(c.endpoint(), ENDPOINT);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.method.as_str(), "POST");
        assert_eq!(req.url, ENDPOINT);
        assert_eq!(
            req.headers,
            vec![(
                "Content-Type".to_string(),
                "application/soap+xml; charset=utf-8".to_string()
            )]
        );
        let body = req.body.unwrap();
        assert!(body.contains("<tns:text>a &amp; b</tns:text>"));
        assert!(body.contains("<tns:entityType>1</tns:entityType>"));
    }

    #[test]
    fn default_config_targets_public_service() {
        let config = ClientConfig::from_resources().unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.response_pattern.contains("ProcessTextResult"));
    }

    #[tokio::test]
    async fn invalid_pattern_is_a_construction_error() {
        let config = ClientConfig {
            endpoint: ENDPOINT.to_string(),
            response_pattern: "(unclosed".to_string(),
        };
        let err = TypografClient::with_transport(config, Arc::new(PendingTransport)).unwrap_err();
        assert!(matches!(err, ClientError::InvalidPattern(_)));
    }

    #[tokio::test]
    async fn parse_response_success() {
        let c = client(Arc::new(PendingTransport));
        let outcome = c.parse_response(Ok(soap_ok("«Ёлки» — палки")));
        assert_eq!(outcome, OperationOutcome::Success("«Ёлки» — палки".to_string()));
    }

    #[tokio::test]
    async fn parse_response_server_error() {
        let c = client(Arc::new(PendingTransport));
        let mut response = soap_ok("ignored");
        response.status = 500;
        assert_eq!(
            c.parse_response(Ok(response)),
            OperationOutcome::Failure(TypografError::ServiceUnavailable)
        );
    }

    #[tokio::test]
    async fn parse_response_empty_body() {
        let c = client(Arc::new(PendingTransport));
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert_eq!(
            c.parse_response(Ok(response)),
            OperationOutcome::Failure(TypografError::ServiceUnavailable)
        );
    }

    #[tokio::test]
    async fn parse_response_unmatched_body() {
        let c = client(Arc::new(PendingTransport));
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: b"<soap:Fault>nope</soap:Fault>".to_vec(),
        };
        assert_eq!(
            c.parse_response(Ok(response)),
            OperationOutcome::Failure(TypografError::InvalidResponseData)
        );
    }

    #[tokio::test]
    async fn parse_response_undecodable_body() {
        let c = client(Arc::new(PendingTransport));
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: vec![b'<', 0xFF, 0xFE, b'>'],
        };
        assert_eq!(
            c.parse_response(Ok(response)),
            OperationOutcome::Failure(TypografError::InvalidResponseData)
        );
    }

    #[tokio::test]
    async fn parse_response_uses_declared_charset() {
        let c = client(Arc::new(PendingTransport));
        let xml = "<ProcessTextResult>Привет</ProcessTextResult>";
        let (bytes, _, _) = encoding_rs::WINDOWS_1251.encode(xml);
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/xml; charset=windows-1251".to_string())],
            body: bytes.into_owned(),
        };
        assert_eq!(c.parse_response(Ok(response)), OperationOutcome::Success("Привет".to_string()));
    }

    #[tokio::test]
    async fn parse_response_unknown_charset_falls_back_to_utf8() {
        let c = client(Arc::new(PendingTransport));
        let mut response = soap_ok("ok");
        response.headers = vec![("Content-Type".to_string(), "text/xml; charset=x-bogus".to_string())];
        assert_eq!(c.parse_response(Ok(response)), OperationOutcome::Success("ok".to_string()));
    }

    fn utf16_with_bom(text: &str, big_endian: bool) -> Vec<u8> {
        let mut bytes = if big_endian { vec![0xFE, 0xFF] } else { vec![0xFF, 0xFE] };
        for unit in text.encode_utf16() {
            let pair = if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() };
            bytes.extend_from_slice(&pair);
        }
        bytes
    }

    #[tokio::test]
    async fn parse_response_honours_byte_order_mark() {
        let c = client(Arc::new(PendingTransport));
        let xml = "<ProcessTextResult>«ёлки»</ProcessTextResult>";
        for big_endian in [true, false] {
            let response = HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/xml; charset=utf-16".to_string())],
                body: utf16_with_bom(xml, big_endian),
            };
            assert_eq!(
                c.parse_response(Ok(response)),
                OperationOutcome::Success("«ёлки»".to_string()),
                "big endian: {big_endian}"
            );
        }
    }

    #[tokio::test]
    async fn utf8_bom_is_skipped() {
        let c = client(Arc::new(PendingTransport));
        let mut body = vec![0xEF, 0xBB, 0xBF];
        body.extend_from_slice(b"<ProcessTextResult>ok</ProcessTextResult>");
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body,
        };
        assert_eq!(c.parse_response(Ok(response)), OperationOutcome::Success("ok".to_string()));
    }

    #[tokio::test]
    async fn parse_transport_errors() {
        let c = client(Arc::new(PendingTransport));
        assert_eq!(
            c.parse_response(Err(TransportError::Cancelled)),
            OperationOutcome::Cancelled
        );
        assert_eq!(
            c.parse_response(Err(TransportError::Network("connection refused".into()))),
            OperationOutcome::Failure(TypografError::Response("connection refused".into()))
        );
    }

    #[tokio::test]
    async fn process_text_sends_request_and_delivers_success() {
        let transport = ScriptedTransport::new(Ok(soap_ok("done")));
        let c = client(transport.clone());

        let outcome = run(&c, "input <text>").await;
        assert_eq!(outcome, OperationOutcome::Success("done".to_string()));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, ENDPOINT);
        assert!(requests[0]
            .body
            .as_deref()
            .unwrap()
            .contains("<tns:text>input &lt;text&gt;</tns:text>"));
    }

    #[tokio::test]
    async fn process_text_reports_transport_cancellation() {
        let c = client(ScriptedTransport::new(Err(TransportError::Cancelled)));
        assert_eq!(run(&c, "x").await, OperationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn process_text_reports_network_failure() {
        let c = client(ScriptedTransport::new(Err(TransportError::Network("reset".into()))));
        assert_eq!(
            run(&c, "x").await,
            OperationOutcome::Failure(TypografError::Response("reset".into()))
        );
    }

    #[tokio::test]
    async fn cancel_before_response_delivers_cancelled() {
        let c = client(Arc::new(PendingTransport));
        let (tx, rx) = oneshot::channel();
        let handle = c.process_text(&ProcessTextParameters::default(), "x", move |outcome| {
            let _ = tx.send(outcome);
        });
        handle.cancel();
        assert_eq!(rx.await.unwrap(), OperationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn cancel_after_completion_is_a_no_op() {
        let c = client(ScriptedTransport::new(Ok(soap_ok("done"))));
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = Arc::clone(&calls);
        let handle = c.process_text(&ProcessTextParameters::default(), "x", move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(outcome);
        });

        assert!(rx.await.unwrap().is_success());
        handle.cancel();
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dropping_client_cancels_outstanding_calls() {
        let c = client(Arc::new(PendingTransport));
        let (tx, rx) = oneshot::channel();
        let _handle = c.process_text(&ProcessTextParameters::default(), "x", move |outcome| {
            let _ = tx.send(outcome);
        });
        drop(c);
        assert_eq!(rx.await.unwrap(), OperationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn dropping_handle_does_not_cancel() {
        let c = client(ScriptedTransport::new(Ok(soap_ok("kept"))));
        let (tx, rx) = oneshot::channel();
        drop(c.process_text(&ProcessTextParameters::default(), "x", move |outcome| {
            let _ = tx.send(outcome);
        }));
        assert_eq!(rx.await.unwrap(), OperationOutcome::Success("kept".to_string()));
    }

    #[test]
    fn construction_outside_runtime_is_an_error() {
        let err = TypografClient::with_transport(config(), Arc::new(PendingTransport)).unwrap_err();
        assert!(matches!(err, ClientError::NoRuntime));
        assert!(matches!(TypografClient::new().unwrap_err(), ClientError::NoRuntime));
    }

    #[test]
    fn process_text_from_thread_without_runtime() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let extractor = PatternExtractor::new(&config().response_pattern).unwrap();
        let c = TypografClient::from_parts(
            ENDPOINT,
            ScriptedTransport::new(Ok(soap_ok("done"))),
            Arc::new(extractor),
            rt.handle().clone(),
        );

        let (tx, rx) = std::sync::mpsc::channel();
        let _handle = c.process_text(&ProcessTextParameters::default(), "x", move |outcome| {
            let _ = tx.send(outcome);
        });
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, OperationOutcome::Success("done".to_string()));
    }

    #[test]
    fn cancel_from_thread_without_runtime() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let extractor = PatternExtractor::new(&config().response_pattern).unwrap();
        let c = TypografClient::from_parts(
            ENDPOINT,
            Arc::new(PendingTransport),
            Arc::new(extractor),
            rt.handle().clone(),
        );

        let (tx, rx) = std::sync::mpsc::channel();
        let handle = c.process_text(&ProcessTextParameters::default(), "x", move |outcome| {
            let _ = tx.send(outcome);
        });
        handle.cancel();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, OperationOutcome::Cancelled);
    }
}
