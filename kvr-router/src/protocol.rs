//! Messages exchanged over the persistent connection.
//!
//! A request is one JSON object with a string `type` field; the remaining
//! fields depend on the type. Every request gets exactly one response object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded request object, before the handler checks its fields.
pub type Envelope = Map<String, Value>;

/// Value of `data` returned by `GET` when the key does not exist.
pub const NULL_SENTINEL: &str = "null";

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Response {
    Data { data: String },
    Status(StatusResponse),
}

impl Response {
    pub fn data(data: impl Into<String>) -> Self {
        Response::Data { data: data.into() }
    }

    pub fn not_found() -> Self {
        Self::data(NULL_SENTINEL)
    }

    pub fn ok() -> Self {
        Self::status(200, "OK")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(400, message)
    }

    pub fn internal_error() -> Self {
        Self::status(500, INTERNAL_ERROR_MESSAGE)
    }

    fn status(code: u16, message: impl Into<String>) -> Self {
        Response::Status(StatusResponse {
            code,
            message: message.into(),
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{0} field is missing")]
    Missing(&'static str),
    #[error("{0} field must be a string")]
    NotString(&'static str),
}

impl From<FieldError> for Response {
    fn from(e: FieldError) -> Self {
        Response::bad_request(e.to_string())
    }
}

pub fn string_field(
    envelope: &Envelope,
    name: &'static str,
) -> Result<String, FieldError> {
    match envelope.get(name) {
        None => Err(FieldError::Missing(name)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(FieldError::NotString(name)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub id: String,
}

impl TryFrom<&Envelope> for GetRequest {
    type Error = FieldError;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(GetRequest {
            id: string_field(envelope, "id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub id: String,
    pub data: String,
}

impl TryFrom<&Envelope> for PutRequest {
    type Error = FieldError;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(PutRequest {
            id: string_field(envelope, "id")?,
            data: string_field(envelope, "data")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(v: Value) -> Envelope {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn responses_serialize_to_wire_shapes() {
        let cases = [
            (Response::data("v1"), json!({"data": "v1"})),
            (Response::not_found(), json!({"data": "null"})),
            (Response::ok(), json!({"code": 200, "message": "OK"})),
            (
                Response::bad_request("Unknown request type"),
                json!({"code": 400, "message": "Unknown request type"}),
            ),
            (
                Response::internal_error(),
                json!({"code": 500, "message": "Internal Server Error"}),
            ),
        ];
        for (resp, expected) in cases {
            assert_eq!(serde_json::to_value(&resp).unwrap(), expected);
        }
    }

    #[test]
    fn response_parses_back() {
        let resp: Response =
            serde_json::from_str(r#"{"code":400,"message":"x"}"#).unwrap();
        assert_eq!(resp, Response::bad_request("x"));
        let resp: Response = serde_json::from_str(r#"{"data":"v"}"#).unwrap();
        assert_eq!(resp, Response::data("v"));
    }

    #[test]
    fn get_request_requires_string_id() {
        let ok = envelope(json!({"type": "GET", "id": "k1"}));
        assert_eq!(
            GetRequest::try_from(&ok),
            Ok(GetRequest { id: "k1".into() })
        );
        let missing = envelope(json!({"type": "GET"}));
        assert_eq!(
            GetRequest::try_from(&missing).unwrap_err().to_string(),
            "id field is missing"
        );
        let number = envelope(json!({"type": "GET", "id": 7}));
        assert_eq!(
            GetRequest::try_from(&number).unwrap_err().to_string(),
            "id field must be a string"
        );
    }

    #[test]
    fn put_request_checks_id_before_data() {
        let neither = envelope(json!({"type": "PUT"}));
        assert_eq!(
            PutRequest::try_from(&neither),
            Err(FieldError::Missing("id"))
        );
        let no_data = envelope(json!({"type": "PUT", "id": "k"}));
        assert_eq!(
            PutRequest::try_from(&no_data),
            Err(FieldError::Missing("data"))
        );
        let bad_data = envelope(json!({"type": "PUT", "id": "k", "data": [1]}));
        assert_eq!(
            Response::from(PutRequest::try_from(&bad_data).unwrap_err()),
            Response::bad_request("data field must be a string")
        );
        let null_data =
            envelope(json!({"type": "PUT", "id": "k", "data": null}));
        assert_eq!(
            PutRequest::try_from(&null_data),
            Err(FieldError::NotString("data"))
        );
    }
}
