#[cfg(feature = "embed-frontend")]
use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode, Uri},
};
#[cfg(feature = "embed-frontend")]
use mime_guess::MimeGuess;

#[cfg(feature = "embed-frontend")]
use include_dir::{include_dir, Dir};

#[cfg(feature = "embed-frontend")]
static FRONTEND_DIST: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/web/static");

#[cfg(feature = "embed-frontend")]
fn cache_control_for(path: &str) -> HeaderValue {
    if path == "index.html" {
        HeaderValue::from_static("no-store")
    } else {
        HeaderValue::from_static("public, max-age=3600")
    }
}

#[cfg(feature = "embed-frontend")]
fn build_response(path: &str, bytes: &'static [u8]) -> Response<Body> {
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    let mut response = Response::new(Body::from(bytes));
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control_for(path));
    response
}

/// Serve the bundled front-end for any path no API route claimed
#[cfg(feature = "embed-frontend")]
pub async fn embedded_handler(uri: Uri) -> Response<Body> {
    let req_path = uri.path().trim_start_matches('/');
    let req_path = if req_path.is_empty() || req_path.ends_with('/') {
        format!("{}index.html", req_path)
    } else {
        req_path.to_string()
    };

    match FRONTEND_DIST.get_file(&req_path) {
        Some(file) => build_response(&req_path, file.contents()),
        None => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    }
}

/// Serve front-end assets from `dir`; `/` maps to `index.html`
#[cfg(not(feature = "embed-frontend"))]
pub fn static_service(dir: &std::path::Path) -> tower_http::services::ServeDir {
    tower_http::services::ServeDir::new(dir)
}
