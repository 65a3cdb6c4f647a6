use crate::utils::trace::{self, TraceContext};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assigns every request a trace id and runs the rest of the pipeline under it.
///
/// An inbound `X-Trace-ID` (or `X-Request-ID`) is reused. The id is echoed back in both headers.
pub struct TraceIdMiddleware {
    expose_errors: bool,
}

impl TraceIdMiddleware {
    /// `expose_errors`: whether internal error messages reach clients (debug mode).
    pub fn new(expose_errors: bool) -> Self {
        Self { expose_errors }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TraceIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TraceIdMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TraceIdMiddlewareService {
            service: Rc::new(service),
            expose_errors: self.expose_errors,
        }))
    }
}

pub struct TraceIdMiddlewareService<S> {
    service: Rc<S>,
    expose_errors: bool,
}

fn inbound_trace_id(req: &ServiceRequest) -> Option<String> {
    [TRACE_ID_HEADER, REQUEST_ID_HEADER]
        .iter()
        .filter_map(|name| req.headers().get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

impl<S, B> Service<ServiceRequest> for TraceIdMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let trace_id = inbound_trace_id(&req).unwrap_or_else(trace::new_trace_id);

        let context = TraceContext {
            trace_id: trace_id.clone(),
            path: Some(req.path().to_string()),
            expose_errors: self.expose_errors,
        };
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let mut res = trace::scope(context, service.call(req)).await?;

            if let Ok(value) = HeaderValue::from_str(&trace_id) {
                let headers = res.headers_mut();
                headers.insert(HeaderName::from_static(TRACE_ID_HEADER), value.clone());
                headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn echo_trace() -> HttpResponse {
        HttpResponse::Ok().body(trace::current_trace_id().unwrap_or_default())
    }

    #[actix_rt::test]
    async fn test_generates_trace_id() {
        let app = test::init_service(
            App::new()
                .wrap(TraceIdMiddleware::new(false))
                .route("/", web::get().to(echo_trace)),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let header = res.headers().get("X-Trace-ID").unwrap().to_str().unwrap().to_string();
        assert_eq!(header.len(), 36);
        assert_eq!(res.headers().get("X-Request-ID").unwrap(), header.as_str());

        let body = test::read_body(res).await;
        assert_eq!(body, header.as_bytes());
    }

    #[actix_rt::test]
    async fn test_reuses_inbound_ids() {
        let app = test::init_service(
            App::new()
                .wrap(TraceIdMiddleware::new(false))
                .route("/", web::get().to(echo_trace)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("X-Trace-ID", "trace-abc"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.headers().get("X-Trace-ID").unwrap(), "trace-abc");

        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("X-Request-ID", "req-123"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.headers().get("X-Trace-ID").unwrap(), "req-123");
        assert_eq!(res.headers().get("X-Request-ID").unwrap(), "req-123");
    }

    #[actix_rt::test]
    async fn test_error_body_carries_trace_id() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(crate::api::testing::state()))
                .wrap(TraceIdMiddleware::new(false))
                .configure(crate::api::configure),
        )
        .await;

        let res = test::call_service(&app, test::TestRequest::get().uri("/api/v1/auth/me").to_request()).await;
        assert_eq!(res.status(), actix_web::http::StatusCode::FORBIDDEN);
        let header = res.headers().get("X-Trace-ID").unwrap().to_str().unwrap().to_string();
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["trace_id"], header.as_str());
        assert_eq!(body["path"], "/api/v1/auth/me");

        let req = test::TestRequest::post()
            .uri("/api/v1/auth/login")
            .insert_header(("X-Trace-ID", "trace-422"))
            .set_json(serde_json::json!({"email": "user@example.com"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), actix_web::http::StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res.headers().get("X-Trace-ID").unwrap(), "trace-422");
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["trace_id"], "trace-422");
        assert_eq!(body["path"], "/api/v1/auth/login");
    }
}
