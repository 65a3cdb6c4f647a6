use crate::api::schemas::{EnqueueJobRequest, JobAcceptedResponse};
use crate::api::AppState;
use crate::jobs::{Job, JobRecord};
use crate::middleware::AuthenticatedUser;
use crate::utils::{AppError, AppResult, ErrorDetail, ErrorResponse};
use actix_web::{web, HttpResponse};
use serde_json::{json, Value};

/// `{name, args}` into a typed job. Unit jobs take no args.
fn parse_job(request: EnqueueJobRequest) -> AppResult<Job> {
    let mut envelope = json!({ "name": request.name });
    let has_args = match &request.args {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    };
    if has_args {
        envelope["args"] = request.args;
    }

    serde_json::from_value(envelope).map_err(|e| {
        let message = e.to_string();
        let field = if message.starts_with("unknown variant") {
            "name"
        } else {
            "args"
        };
        AppError::RequestValidation(vec![ErrorDetail::field(field, message, "value_error")])
    })
}

#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    request_body = EnqueueJobRequest,
    responses(
        (status = 202, description = "Job queued", body = JobAcceptedResponse),
        (status = 403, description = "Admin privileges required", body = ErrorResponse),
        (status = 422, description = "Unknown job or bad arguments", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn enqueue_job(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    request: web::Json<EnqueueJobRequest>,
) -> AppResult<HttpResponse> {
    state.require_admin(&caller).await?;
    let job = parse_job(request.into_inner())?;

    let name = job.name().to_string();
    let queue = job.queue().as_str().to_string();
    let job_id = state.jobs.enqueue(job);
    log::info!("📥 POST /jobs - {} queued as {} by {}", name, job_id, caller.user_id);

    Ok(HttpResponse::Accepted().json(JobAcceptedResponse { job_id, name, queue }))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}",
    tag = "Jobs",
    params(
        ("job_id" = String, Path, description = "Id returned when the job was queued")
    ),
    responses(
        (status = 200, description = "Job state", body = JobRecord),
        (status = 404, description = "Unknown or expired job", body = ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_job(
    state: web::Data<AppState>,
    caller: AuthenticatedUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.require_admin(&caller).await?;
    let job_id = path.into_inner();

    let record = state
        .jobs
        .status(&job_id)
        .ok_or_else(|| AppError::not_found("Job not found", "job").with_detail("job_id", job_id.as_str()))?;

    Ok(HttpResponse::Ok().json(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{self, test_app};
    use crate::domain::UserRole;
    use actix_web::http::StatusCode;
    use actix_web::test::{call_service, read_body_json, TestRequest};

    fn request(name: &str, args: Value) -> EnqueueJobRequest {
        EnqueueJobRequest {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn test_parse_job() {
        assert_eq!(
            parse_job(request("cleanup_expired_tokens", json!({}))).unwrap(),
            Job::CleanupExpiredTokens
        );
        assert_eq!(
            parse_job(request("export_user_data", json!({"user_id": "u1"}))).unwrap(),
            Job::ExportUserData {
                user_id: "u1".to_string(),
                export_format: "json".to_string(),
            }
        );

        match parse_job(request("mine_bitcoin", Value::Null)).unwrap_err() {
            AppError::RequestValidation(details) => assert_eq!(details[0].field.as_deref(), Some("name")),
            other => panic!("unexpected error {:?}", other),
        }
        match parse_job(request("send_email", json!({"to_email": "a@b.co"}))).unwrap_err() {
            AppError::RequestValidation(details) => assert_eq!(details[0].field.as_deref(), Some("args")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_enqueue_and_query_job() {
        let state = testing::state();
        let (_, admin) = testing::user_with_token(&state, "admin@example.com", UserRole::Admin).await;
        let app = test_app!(state);
        let bearer = ("Authorization", format!("Bearer {}", admin));

        let req = TestRequest::post()
            .uri("/api/v1/jobs")
            .insert_header(bearer.clone())
            .set_json(json!({"name": "send_email", "args": {"to_email": "a@example.com", "subject": "Hi", "body": "Hello"}}))
            .to_request();
        let res = call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let body: Value = read_body_json(res).await;
        assert_eq!(body["queue"], "email");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let req = TestRequest::get()
            .uri(&format!("/api/v1/jobs/{}", job_id))
            .insert_header(bearer.clone())
            .to_request();
        let res = call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = read_body_json(res).await;
        assert_eq!(body["name"], "send_email");
        assert_eq!(body["status"], "pending");

        let req = TestRequest::get()
            .uri("/api/v1/jobs/does-not-exist")
            .insert_header(bearer)
            .to_request();
        let res = call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
