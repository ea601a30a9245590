use std::sync::Arc;

use bytes::Bytes;

use crate::{
    dispatch::RequestHandler,
    error::HandlerError,
    protocol::{Envelope, PutRequest, Response},
    route::ShardRouter,
};

pub struct PutHandler {
    router: Arc<ShardRouter>,
}

impl PutHandler {
    pub fn new(router: Arc<ShardRouter>) -> Self {
        Self { router }
    }

    async fn put(&self, req: PutRequest) -> Result<Response, HandlerError> {
        let backend = self.router.route(&req.id).await?;
        backend.put(&req.id, Bytes::from(req.data)).await?;
        Ok(Response::ok())
    }
}

#[async_trait::async_trait]
impl RequestHandler for PutHandler {
    fn request_type(&self) -> &'static str {
        "PUT"
    }

    async fn handle(&self, envelope: Envelope) -> Response {
        let req = match PutRequest::try_from(&envelope) {
            Ok(req) => req,
            Err(e) => return e.into(),
        };
        let key = req.id.clone();
        match self.put(req).await {
            Ok(resp) => resp,
            Err(e) => super::internal_error(self, &key, e),
        }
    }
}
