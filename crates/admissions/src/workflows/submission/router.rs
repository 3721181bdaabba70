use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        multipart::MultipartRejection, DefaultBodyLimit, FromRequest, Multipart, Request, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::domain::{ApiResponse, Enquiry, SubmissionStage};
use super::intake::REGISTRATION_BODY_LIMIT;
use super::notify::Notifier;
use super::service::{SubmissionError, SubmissionReceipt, SubmissionService};

/// Router exposing the two form endpoints.
pub fn submission_router<N>(service: Arc<SubmissionService<N>>) -> Router
where
    N: Notifier + 'static,
{
    Router::new()
        .route("/submit-registration", post(registration_handler::<N>))
        .route("/submit-enquiry", post(enquiry_handler::<N>))
        .layer(DefaultBodyLimit::max(REGISTRATION_BODY_LIMIT))
        .with_state(service)
}

pub(crate) async fn registration_handler<N>(
    State(service): State<Arc<SubmissionService<N>>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    N: Notifier + 'static,
{
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(error = %rejection, "registration body is not multipart");
            return respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::failure("Error processing registration"),
            );
        }
    };

    match service.register_multipart(multipart).await {
        Ok(receipt) => accepted(receipt),
        Err(err) => failed(&err, true),
    }
}

pub(crate) async fn enquiry_handler<N>(
    State(service): State<Arc<SubmissionService<N>>>,
    SubmittedForm(enquiry): SubmittedForm<Enquiry>,
) -> Response
where
    N: Notifier + 'static,
{
    match service.enquire(enquiry).await {
        Ok(receipt) => accepted(receipt),
        Err(err) => failed(&err, false),
    }
}

fn accepted(receipt: SubmissionReceipt) -> Response {
    debug!(
        submission = %receipt.submission.id,
        stage = SubmissionStage::Responding.label(),
        "responding"
    );
    respond(StatusCode::OK, ApiResponse::success(receipt.message))
}

fn failed(err: &SubmissionError, registration: bool) -> Response {
    respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiResponse::failure(err.public_message(registration)),
    )
}

fn respond(status: StatusCode, body: ApiResponse) -> Response {
    (status, Json(body)).into_response()
}

/// Form body accepted either as JSON or as `application/x-www-form-urlencoded`,
/// chosen by the request's content type.
pub struct SubmittedForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for SubmittedForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .map(|content_type| {
                content_type.subtype() == mime::JSON || content_type.suffix() == Some(mime::JSON)
            })
            .unwrap_or(false);

        if is_json {
            match Json::<T>::from_request(req, state).await {
                Ok(Json(value)) => Ok(Self(value)),
                Err(rejection) => Err(malformed(rejection.body_text())),
            }
        } else {
            match Form::<T>::from_request(req, state).await {
                Ok(Form(value)) => Ok(Self(value)),
                Err(rejection) => Err(malformed(rejection.body_text())),
            }
        }
    }
}

fn malformed(detail: String) -> Response {
    warn!(%detail, "submission body could not be parsed");
    respond(
        StatusCode::BAD_REQUEST,
        ApiResponse::failure("Invalid form submission"),
    )
}
