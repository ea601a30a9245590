use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{Envelope, Response};

#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    /// Value of the `type` field this handler serves.
    fn request_type(&self) -> &'static str;

    /// Handles one request. Failures are reported in the response itself.
    async fn handle(&self, envelope: Envelope) -> Response;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Request should be a JSON")]
    NotJson,
    #[error("type field is missing")]
    MissingType,
    #[error("type field is not a string")]
    TypeNotString,
    #[error("Unknown request type")]
    UnknownType(String),
}

impl From<EnvelopeError> for Response {
    fn from(e: EnvelopeError) -> Self {
        Response::bad_request(e.to_string())
    }
}

/// Request type to handler. Built once before serving, read-only afterwards.
pub struct HandlerTable {
    handlers: HashMap<&'static str, Arc<dyn RequestHandler>>,
}

impl HandlerTable {
    pub fn builder() -> HandlerTableBuilder {
        HandlerTableBuilder {
            handlers: HashMap::new(),
        }
    }

    pub fn request_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Decodes one raw message and produces its single response.
    pub async fn dispatch(&self, raw: &[u8]) -> Response {
        let envelope = match decode_envelope(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "rejecting malformed request");
                return e.into();
            }
        };
        match self.select(&envelope) {
            Ok(handler) => {
                debug!(request_type = handler.request_type(), "dispatch request");
                handler.handle(envelope).await
            }
            Err(e) => {
                warn!(error = ?e, "rejecting request");
                e.into()
            }
        }
    }

    fn select(
        &self,
        envelope: &Envelope,
    ) -> Result<&Arc<dyn RequestHandler>, EnvelopeError> {
        let request_type = match envelope.get("type") {
            None => return Err(EnvelopeError::MissingType),
            Some(Value::String(t)) => t,
            Some(_) => return Err(EnvelopeError::TypeNotString),
        };
        self.handlers
            .get(request_type.as_str())
            .ok_or_else(|| EnvelopeError::UnknownType(request_type.clone()))
    }
}

pub struct HandlerTableBuilder {
    handlers: HashMap<&'static str, Arc<dyn RequestHandler>>,
}

impl HandlerTableBuilder {
    /// Registers `handler` under its request type, replacing any earlier
    /// handler for the same type.
    pub fn with<H>(mut self, handler: H) -> Self
    where
        H: RequestHandler + 'static,
    {
        self.handlers.insert(handler.request_type(), Arc::new(handler));
        self
    }

    pub fn build(self) -> Arc<HandlerTable> {
        Arc::new(HandlerTable {
            handlers: self.handlers,
        })
    }
}

/// A JSON `null` decodes to an empty envelope and is then rejected for its
/// missing `type`.
fn decode_envelope(raw: &[u8]) -> Result<Envelope, EnvelopeError> {
    serde_json::from_slice::<Option<Envelope>>(raw)
        .map(Option::unwrap_or_default)
        .map_err(|_| EnvelopeError::NotJson)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Echo {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl RequestHandler for Echo {
        fn request_type(&self) -> &'static str {
            "ECHO"
        }

        async fn handle(&self, envelope: Envelope) -> Response {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Response::data(Value::Object(envelope).to_string())
        }
    }

    fn table() -> (Arc<HandlerTable>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let table = HandlerTable::builder()
            .with(Echo {
                calls: calls.clone(),
            })
            .build();
        (table, calls)
    }

    #[tokio::test]
    async fn dispatches_to_registered_type() {
        let (table, calls) = table();
        let resp = table.dispatch(br#"{"type":"ECHO","x":1}"#).await;
        assert_eq!(resp, Response::data(r#"{"type":"ECHO","x":1}"#));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.request_types(), vec!["ECHO"]);
    }

    #[tokio::test]
    async fn rejects_bad_envelopes_without_calling_handlers() {
        let (table, calls) = table();
        let cases: [(&[u8], &str); 8] = [
            (b"not json", "Request should be a JSON"),
            (b"[1,2]", "Request should be a JSON"),
            (b"\"ECHO\"", "Request should be a JSON"),
            (b"{}", "type field is missing"),
            (b"null", "type field is missing"),
            (br#"{"type":5}"#, "type field is not a string"),
            (br#"{"type":"DELETE"}"#, "Unknown request type"),
            (br#"{"type":"echo"}"#, "Unknown request type"),
        ];
        for (raw, message) in cases {
            assert_eq!(table.dispatch(raw).await, Response::bad_request(message));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
