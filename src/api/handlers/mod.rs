mod files;
mod health;
mod public;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::service::Download;
use crate::storage::models::Disposition;

pub use files::{
    delete_file, disable_share, download_file, enable_share, list_files, upload_file,
    FileResponse, ShareResponse,
};
pub use health::health;
pub use public::public_download;

/// Build a streamed download response. The body is never buffered.
fn download_response(download: Download, cache_control: &'static str) -> Response {
    let file = download.file;
    let mut response = (StatusCode::OK, Body::from_stream(download.body)).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&file.mime_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );

    let kind = match download.disposition {
        Disposition::Attachment => "attachment",
        Disposition::Inline => "inline",
    };
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(kind, &file.original_name),
    );

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );

    response
}

/// `kind; filename="ascii"; filename*=UTF-8''encoded`, falling back to the bare kind.
fn content_disposition(kind: &'static str, filename: &str) -> HeaderValue {
    let ascii: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!(
        "{kind}; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    ))
    .unwrap_or(HeaderValue::from_static(kind))
}
