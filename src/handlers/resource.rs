//! Generic CRUD handlers shared by every registered resource.

use axum::{
    body::Bytes,
    extract::Path,
    http::{header::HOST, HeaderMap, HeaderName, Uri},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{Admitted, ApiResponse};

const ENTITY_HEADER: HeaderName = HeaderName::from_static("entity");

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid id '{}': expected a UUID", raw)))
}

/// GET /{api}/{resource}
pub async fn list(Admitted(admission): Admitted) -> Result<impl IntoResponse, ApiError> {
    let page = admission.repository.list().await?;
    tracing::debug!(
        "Listed {} rows of {} (page {}, size {})",
        page.data.len(),
        admission.repository.resource(),
        page.page,
        page.page_size
    );
    Ok(ApiResponse::success(page))
}

/// GET /{api}/{resource}/{id}
pub async fn get(
    Admitted(admission): Admitted,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let object = admission.repository.get(id).await?;
    Ok(ApiResponse::success(object))
}

/// POST /{api}/{resource}
pub async fn create(
    Admitted(admission): Admitted,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let object = admission.repository.create(&body).await?;

    let host = headers.get(HOST).and_then(|h| h.to_str().ok()).unwrap_or_default();
    let id = object.id().map(|id| id.to_string()).unwrap_or_default();
    let location = format!("{}{}/{}", host, uri.path().trim_end_matches('/'), id);

    tracing::info!("User {:?} created {} {}", admission.user.id, admission.repository.resource(), id);
    Ok(ApiResponse::created(object, location))
}

/// PUT /{api}/{resource}/{id}
pub async fn update(
    Admitted(admission): Admitted,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let object = admission.repository.update(id, &body).await?;
    Ok(ApiResponse::success(object))
}

/// DELETE /{api}/{resource}/{id}
pub async fn delete(
    Admitted(admission): Admitted,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    admission.repository.delete(id).await?;
    tracing::info!("User {:?} deleted {} {}", admission.user.id, admission.repository.resource(), id);
    Ok(ApiResponse::no_content().with_header(ENTITY_HEADER, id.to_string()))
}
