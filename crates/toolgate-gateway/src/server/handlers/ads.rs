//! Ads upstream routes (token-guarded)

use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde_json::json;
use toolgate_core::UpstreamTarget;
use tracing::info;

use super::{ads_get, ads_send, json_body, json_content_type, pass_through};
use crate::error::{GatewayError, Result};
use crate::proxy::payload::{
    normalize_campaign_dates, parse_json_body, require_json, require_multipart,
};
use crate::proxy::upload::{UploadByUrlRequest, UploadByUrlsRequest, UPLOAD_PATH};
use crate::proxy::{with_segment, ProxyQuery};
use crate::server::AppState;

const ADVERTISERS: &str = "/api/v1/advertisers/";
const CAMPAIGNS: &str = "/api/v1/campaigns/";
const PROJECTS: &str = "/api/v1/projects/";
const DEVICES: &str = "/api/v1/devices/";
const VENUES: &str = "/api/v1/venues/";
const CREATIVES: &str = "/api/v1/creatives/";

pub async fn list_advertisers(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, ADVERTISERS, query).await
}

pub async fn create_advertiser(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Ads,
        ADVERTISERS,
        &ProxyQuery::parse(query.as_deref()),
    )?;
    require_json(&headers, "Expected application/json for advertiser creation")?;
    let payload = parse_json_body(&body)?;

    ads_send(&state, Method::POST, url, json_content_type(), json_body(&payload)?).await
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, CAMPAIGNS, query).await
}

/// Bare `YYYY-MM-DD` start and end dates are sent as midnight UTC
pub async fn create_campaign(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Ads,
        CAMPAIGNS,
        &ProxyQuery::parse(query.as_deref()),
    )?;
    require_json(&headers, "Expected application/json for campaign creation")?;
    let payload = normalize_campaign_dates(parse_json_body(&body)?);

    ads_send(&state, Method::POST, url, json_content_type(), json_body(&payload)?).await
}

pub async fn campaign_impressions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let path = format!("{}/impressions", with_segment(CAMPAIGNS, &id));
    ads_get(&state, &path, query).await
}

pub async fn list_projects(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, PROJECTS, query).await
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, &with_segment(PROJECTS, &name), query).await
}

pub async fn list_devices(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, DEVICES, query).await
}

pub async fn device_region_counts(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, "/api/v1/devices/counts/regions", query).await
}

/// Device by host name
pub async fn get_device(
    State(state): State<AppState>,
    Path(host): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, &with_segment(DEVICES, &host), query).await
}

pub async fn device_venues(
    State(state): State<AppState>,
    Path(device): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let path = format!("{}/venues", with_segment(DEVICES, &device));
    ads_get(&state, &path, query).await
}

pub async fn list_venues(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, VENUES, query).await
}

pub async fn get_venue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, &with_segment(VENUES, &id), query).await
}

pub async fn venue_devices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let path = format!("{}/devices", with_segment(VENUES, &id));
    ads_get(&state, &path, query).await
}

pub async fn list_creatives(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    ads_get(&state, CREATIVES, query).await
}

pub async fn campaign_creatives(
    State(state): State<AppState>,
    Path(campaign_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    let path = with_segment("/api/v1/creatives/campaign", &campaign_id);
    ads_get(&state, &path, query).await
}

/// Raw multipart upload. The body is buffered so the upstream always sees an
/// explicit content-length.
pub async fn upload_creatives(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Ads,
        UPLOAD_PATH,
        &ProxyQuery::parse(query.as_deref()),
    )?;
    require_multipart(&headers)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .ok_or_else(|| GatewayError::bad_request("content-type is required"))?;

    ads_send(&state, Method::POST, url, content_type, body).await
}

/// Download one remote file and upload it as a creative
pub async fn upload_by_url(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Ads,
        UPLOAD_PATH,
        &ProxyQuery::parse(query.as_deref()),
    )?;
    require_json(&headers, "Expected application/json for upload by URL")?;
    let request: UploadByUrlRequest = serde_json::from_value(parse_json_body(&body)?)
        .map_err(|e| GatewayError::bad_request(format!("Invalid JSON body: {}", e)))?;
    let (fields, file_url) = request.validate()?;
    // A failed login ends the request before anything is downloaded
    state.session.ensure(false).await?;

    let response = state.uploader.upload_from_url(&url, &fields, &file_url).await?;
    Ok(response.into_response())
}

/// Bulk upload by URL: always 207 with one result per input URL, in order
pub async fn upload_by_urls(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let url = state.target_url(
        UpstreamTarget::Ads,
        UPLOAD_PATH,
        &ProxyQuery::parse(query.as_deref()),
    )?;
    require_json(&headers, "Expected application/json for upload by URL")?;
    let request: UploadByUrlsRequest = serde_json::from_value(parse_json_body(&body)?)
        .map_err(|e| GatewayError::bad_request(format!("Invalid JSON body: {}", e)))?;
    let (fields, file_urls) = request.validate()?;
    state.session.ensure(false).await?;

    info!("[Upload] Bulk upload of {} URLs", file_urls.len());
    let results = state
        .uploader
        .upload_from_urls(&url, &fields, file_urls, state.config.upload_concurrency)
        .await;

    Ok((StatusCode::MULTI_STATUS, Json(json!({ "results": results }))).into_response())
}

/// Catch-all: `/ads/<rest>` goes to `/<rest>` on the ads upstream
pub async fn proxy_any(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    let path = uri.path().strip_prefix("/ads").unwrap_or_default();
    pass_through(
        &state,
        UpstreamTarget::Ads,
        path,
        uri.query(),
        method,
        headers,
        body,
    )
    .await
}
