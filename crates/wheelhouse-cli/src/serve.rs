//! HTTP front end for the registry.

use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request as HttpRequest, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method as HttpMethod, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::get,
    Router,
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};
use wheelhouse_config::error::ConfigError;
use wheelhouse_core::error::ErrorContext;
use wheelhouse_operations::{
    dispatch::Dispatcher, Method, RegistryContext, Request, Response, Result, UploadedFile,
};

/// Multipart field carrying the distribution file.
const CONTENT_FIELD: &str = "content";

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
    max_upload_size: usize,
}

pub async fn serve(ctx: RegistryContext, listen: Option<String>) -> Result<()> {
    let listen = listen.unwrap_or_else(|| ctx.config().listen().to_string());
    let addr: SocketAddr = listen
        .parse()
        .map_err(|_| ConfigError::InvalidListenAddress(listen.clone()))?;

    let media = media_route(ctx.config().media_url());
    let state = AppState {
        max_upload_size: usize::try_from(ctx.config().max_upload_size()).unwrap_or(usize::MAX),
        dispatcher: Dispatcher::new(ctx),
    };
    let app = router(state, media.as_deref());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Serving registry on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "serving HTTP requests".into())?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn router(state: AppState, media: Option<&str>) -> Router {
    let mut router = Router::new()
        .route("/", get(endpoint).post(endpoint))
        .route("/pypi", get(endpoint).post(endpoint))
        .route("/pypi/", get(endpoint).post(endpoint))
        .route("/simple", get(simple_index))
        .route("/simple/", get(simple_index))
        .route("/simple/:name", get(simple_project))
        .route("/simple/:name/", get(simple_project));

    if let Some(media) = media {
        router = router.route(media, get(media_file));
    }

    router
        .layer(DefaultBodyLimit::max(state.max_upload_size))
        .with_state(state)
}

/// Route pattern serving stored files below the configured media URL.
///
/// Media URLs pointing at another host, or at the site root, are not served here.
fn media_route(media_url: &str) -> Option<String> {
    if !media_url.starts_with('/') {
        return None;
    }
    let prefix = media_url.trim_end_matches('/');
    if prefix.is_empty() || prefix.contains(['*', ':']) {
        return None;
    }
    Some(format!("{prefix}/*path"))
}

async fn endpoint(State(state): State<AppState>, request: HttpRequest) -> HttpResponse {
    let (request, uploads) = match read_request(&state, request).await {
        Ok(read) => read,
        Err(response) => return response,
    };

    let dispatcher = state.dispatcher.clone();
    run_blocking(move || {
        let response = dispatcher.handle(&request);
        drop(uploads);
        response
    })
    .await
}

async fn simple_index(State(state): State<AppState>) -> HttpResponse {
    run_blocking(move || state.dispatcher.simple_index()).await
}

async fn simple_project(State(state): State<AppState>, Path(name): Path<String>) -> HttpResponse {
    run_blocking(move || state.dispatcher.simple_project(&name)).await
}

async fn media_file(State(state): State<AppState>, Path(path): Path<String>) -> HttpResponse {
    let Some(file_path) = state.dispatcher.media_path(&path) else {
        return (StatusCode::NOT_FOUND, "Not found\n").into_response();
    };

    let file = match tokio::fs::File::open(&file_path).await {
        Ok(file) => file,
        Err(err) => {
            error!("cannot open {}: {err}", file_path.display());
            return (StatusCode::NOT_FOUND, "Not found\n").into_response();
        }
    };
    let filename = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    debug!(filename = filename.as_str(), "serving stored file");

    (
        [
            (header::CONTENT_TYPE, content_type(&filename).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

fn content_type(filename: &str) -> &'static str {
    if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        "application/gzip"
    } else if filename.ends_with(".zip") || filename.ends_with(".whl") || filename.ends_with(".egg")
    {
        "application/zip"
    } else {
        "application/octet-stream"
    }
}

/// Runs a dispatcher call on the blocking pool.
async fn run_blocking<F>(f: F) -> HttpResponse
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(response) => into_http(response),
        Err(err) => {
            error!("request handler failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error\n").into_response()
        }
    }
}

/// Converts an axum request into a protocol request.
///
/// File parts named `content` are streamed into a temporary directory that must outlive the
/// dispatch; other parts, including signature files, become form values.
async fn read_request(
    state: &AppState,
    request: HttpRequest,
) -> std::result::Result<(Request, Option<TempDir>), HttpResponse> {
    let method = match *request.method() {
        HttpMethod::GET => Method::Get,
        HttpMethod::HEAD => Method::Head,
        HttpMethod::POST => Method::Post,
        _ => Method::Other,
    };

    let mut protocol = Request::new(method);
    protocol.query = request
        .uri()
        .query()
        .map(|query| parse_pairs(query.as_bytes()))
        .unwrap_or_default();
    protocol.content_type = header_string(request.headers(), header::CONTENT_TYPE);
    protocol.authorization = header_string(request.headers(), header::AUTHORIZATION);

    let mime = protocol
        .content_type
        .as_deref()
        .and_then(|content_type| content_type.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if method == Method::Post && mime == "multipart/form-data" {
        let mut multipart = Multipart::from_request(request, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let dir = tempfile::Builder::new()
            .prefix("wheelhouse-upload.")
            .tempdir()
            .map_err(internal_error)?;

        while let Some(mut field) = multipart.next_field().await.map_err(bad_request)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) if name == CONTENT_FIELD => {
                    let path = dir.path().join(format!("upload-{}", protocol.files.len()));
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .map_err(internal_error)?;
                    while let Some(chunk) = field.chunk().await.map_err(bad_request)? {
                        file.write_all(&chunk).await.map_err(internal_error)?;
                    }
                    file.flush().await.map_err(internal_error)?;
                    debug!(filename = filename.as_str(), "received upload");
                    protocol.files.push((
                        name,
                        UploadedFile {
                            path,
                            filename,
                        },
                    ));
                }
                _ => {
                    let value = field.text().await.map_err(bad_request)?;
                    protocol.form.push((name, value));
                }
            }
        }
        return Ok((protocol, Some(dir)));
    }

    let body = to_bytes(request.into_body(), state.max_upload_size)
        .await
        .map_err(|err| (StatusCode::PAYLOAD_TOO_LARGE, format!("{err}\n")).into_response())?;
    if method == Method::Post && mime == "application/x-www-form-urlencoded" {
        protocol.form = parse_pairs(&body);
    } else {
        protocol.body = body.to_vec();
    }
    Ok((protocol, None))
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn bad_request<E: std::fmt::Display>(err: E) -> HttpResponse {
    (StatusCode::BAD_REQUEST, format!("Invalid request: {err}\n")).into_response()
}

fn internal_error<E: std::fmt::Display>(err: E) -> HttpResponse {
    error!("cannot store upload: {err}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error\n").into_response()
}

fn into_http(response: Response) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    (status, headers, response.body).into_response()
}
