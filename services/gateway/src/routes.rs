//! Gateway routes

use axum::{
    Extension, Form, Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State, multipart::MultipartRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::any::Any;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    auth::{self, LoginForm, SESSION_COOKIE},
    config::{ConfigError, GatewayConfig},
    error::{GatewayError, GatewayResult, PageError},
    middleware::{CurrentUser, LOGIN_PATH, LOGOUT_PATH, found, require_session},
    models::{GalleryPage, media::page_count},
    relay::{SendRequest, parse_url_set},
    state::AppState,
    telegram::PhotoUpload,
    views::{self, ErrorPage, GalleryView, LoginPage, SendPage},
};

/// Images shown per gallery page
pub const GALLERY_PAGE_SIZE: u32 = 60;

/// Upload ceiling; Telegram accepts photos up to 10 MB
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Build the application for `config`
///
/// Invalid configuration does not stop the service: every request is then
/// answered with a 500 naming what is missing.
pub fn build_app(config: GatewayConfig, pool: SqlitePool) -> Router {
    let settings = match config.validate() {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return misconfigured_router(e);
        }
    };

    match AppState::new(settings, pool) {
        Ok(state) => create_router(state),
        Err(e) => {
            error!("Failed to initialise gateway: {}", e);
            misconfigured_router_with(format!("Server error: {}", e.public_message()))
        }
    }
}

/// Create the router for the gateway
pub fn create_router(state: AppState) -> Router {
    let gallery_path = format!("/{}", state.settings.admin.path);

    Router::new()
        .route(LOGIN_PATH, get(login_page).post(login))
        .route(LOGOUT_PATH, any(logout))
        .route("/", get(send_page))
        .route(&gallery_path, get(gallery))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/delete-images", post(delete_images))
        .route("/api/status", get(status))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router answering every request with the configuration error
pub fn misconfigured_router(err: ConfigError) -> Router {
    let err = GatewayError::from(err);
    misconfigured_router_with(format!("Server error: {}", err.public_message()))
}

fn misconfigured_router_with(message: String) -> Router {
    Router::new()
        .fallback(move || {
            let message = message.clone();
            async move {
                views::render_page(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &ErrorPage { message: &message },
                )
            }
        })
        .layer(TraceLayer::new_for_http())
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);

    GatewayError::Internal("unexpected failure".to_string()).into_page()
}

/// Login form
pub async fn login_page(State(state): State<AppState>) -> Response {
    views::render_page(
        StatusCode::OK,
        &LoginPage {
            site_key: state.verifier.site_key(),
            error: None,
        },
    )
}

/// Verify captcha and credentials, then open a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    if let Err(failure) = auth::authenticate(&state.settings.admin, &state.verifier, &form).await
    {
        let message = GatewayError::Auth(failure).public_message();
        return Ok(views::render_page(
            StatusCode::UNAUTHORIZED,
            &LoginPage {
                site_key: state.verifier.site_key(),
                error: Some(message.as_str()),
            },
        ));
    }

    let token = state
        .session_repository
        .create_session(&form.username)
        .await?;
    info!("User {} logged in", form.username);

    Ok((jar.add(auth::session_cookie(token)), found("/")).into_response())
}

/// Drop the session, whether or not one existed
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = state.session_repository.revoke(cookie.value()).await {
            warn!("Failed to revoke session on logout: {}", e);
        }
    }

    (jar.add(auth::cleared_session_cookie()), found(LOGIN_PATH)).into_response()
}

/// Send panel
pub async fn send_page(
    State(state): State<AppState>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Response {
    views::render_page(
        StatusCode::OK,
        &SendPage {
            username: &username,
            admin_path: &state.settings.admin.path,
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub page: Option<String>,
}

/// Paginated gallery of indexed images
pub async fn gallery(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> Result<Response, PageError> {
    let page = query
        .page
        .and_then(|p| p.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);

    let total = state.media_repository.count().await?;
    let items = state
        .media_repository
        .list_page(page, GALLERY_PAGE_SIZE)
        .await?;

    let gallery = GalleryPage {
        items,
        page,
        total_pages: page_count(total, GALLERY_PAGE_SIZE),
        total,
    };

    Ok(views::render_page(StatusCode::OK, &GalleryView::new(&gallery)))
}

/// Relay an image and/or a message to the channel
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> GatewayResult<impl IntoResponse> {
    let multipart =
        multipart.map_err(|e| GatewayError::BadRequest(format!("Invalid form data: {}", e)))?;
    let request = read_send_request(multipart).await?;

    let outcome = state.relay.send(request).await?;

    Ok(Json(json!({ "data": outcome.data() })))
}

async fn read_send_request(mut multipart: Multipart) -> GatewayResult<SendRequest> {
    let mut request = SendRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::BadRequest(format!("Invalid file: {}", e)))?;
                request.photo = Some(PhotoUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("message") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| GatewayError::BadRequest(format!("Invalid message: {}", e)))?;
                request.message = Some(text);
            }
            _ => {}
        }
    }

    Ok(request)
}

/// Delete images by URL; the body is a JSON array of URLs
pub async fn delete_images(
    State(state): State<AppState>,
    body: Bytes,
) -> GatewayResult<impl IntoResponse> {
    let urls = parse_url_set(&body)?;
    state.relay.delete(urls).await?;

    Ok(Json(json!({ "success": true })))
}

/// Session status for the current user
pub async fn status(Extension(CurrentUser(username)): Extension<CurrentUser>) -> impl IntoResponse {
    Json(json!({
        "loggedIn": true,
        "username": username,
    }))
}

async fn not_found() -> Response {
    GatewayError::NotFound.into_page()
}
