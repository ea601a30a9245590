use std::sync::Arc;

use tracing::error;

use crate::{
    dispatch::{HandlerTable, RequestHandler},
    error::HandlerError,
    protocol::Response,
    route::ShardRouter,
};

mod get;
mod put;

pub use get::GetHandler;
pub use put::PutHandler;

/// Handler table serving `GET` and `PUT` through `router`.
pub fn build_table(router: Arc<ShardRouter>) -> Arc<HandlerTable> {
    HandlerTable::builder()
        .with(GetHandler::new(router.clone()))
        .with(PutHandler::new(router))
        .build()
}

/// Collapses a failed request into the generic internal error. The cause
/// only goes to the log.
fn internal_error(
    handler: &dyn RequestHandler,
    key: &str,
    e: HandlerError,
) -> Response {
    error!(
        request_type = handler.request_type(),
        key,
        error = %e,
        "request failed"
    );
    Response::internal_error()
}
