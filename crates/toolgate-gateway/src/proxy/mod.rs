//! Request forwarding to the upstream services
//!
//! - `url`: target URL construction and query copying
//! - `forwarder`: buffered and streamed upstream calls, verbatim relay and the
//!   re-login retry
//! - `payload`: content-type checks and date normalization
//! - `multipart`: multipart/form-data synthesis
//! - `upload`: upload-by-URL, single and bulk

pub mod forwarder;
pub mod multipart;
pub mod payload;
pub mod upload;
pub mod url;

pub use forwarder::{
    has_request_body, send_with_session, UpstreamClient, UpstreamResponse, DEFAULT_CONTENT_TYPE,
};
pub use multipart::{generate_boundary, MultipartBody, MultipartBuilder};
pub use upload::{
    CreativeUploader, UploadByUrlRequest, UploadByUrlsRequest, UploadFields, UploadResult,
    MAX_BULK_ITEMS, MAX_UPLOAD_BYTES,
};
pub use url::{build_target_url, normalize_path, with_segment, ProxyQuery, QueryValue};
