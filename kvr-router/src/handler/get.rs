use std::sync::Arc;

use kvr_backend::Lookup;

use crate::{
    dispatch::RequestHandler,
    error::HandlerError,
    protocol::{Envelope, GetRequest, Response},
    route::ShardRouter,
};

pub struct GetHandler {
    router: Arc<ShardRouter>,
}

impl GetHandler {
    pub fn new(router: Arc<ShardRouter>) -> Self {
        Self { router }
    }

    async fn get(&self, req: &GetRequest) -> Result<Response, HandlerError> {
        let backend = self.router.route(&req.id).await?;
        match backend.get(&req.id).await? {
            Lookup::Found(value) => {
                Ok(Response::data(String::from_utf8(value.to_vec())?))
            }
            Lookup::KeyAbsent | Lookup::BucketAbsent => Ok(Response::not_found()),
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for GetHandler {
    fn request_type(&self) -> &'static str {
        "GET"
    }

    async fn handle(&self, envelope: Envelope) -> Response {
        let req = match GetRequest::try_from(&envelope) {
            Ok(req) => req,
            Err(e) => return e.into(),
        };
        match self.get(&req).await {
            Ok(resp) => resp,
            Err(e) => super::internal_error(self, &req.id, e),
        }
    }
}
