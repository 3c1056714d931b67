//! HTML pages rendered with askama
//!
//! Templates receive plain data only: URLs, names and counters.

use askama::Template;
use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::models::GalleryPage;

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage<'a> {
    pub site_key: &'a str,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "send.html")]
pub struct SendPage<'a> {
    pub username: &'a str,
    pub admin_path: &'a str,
}

#[derive(Template)]
#[template(path = "gallery.html")]
pub struct GalleryView<'a> {
    pub urls: Vec<&'a str>,
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<'a> GalleryView<'a> {
    pub fn new(gallery: &'a GalleryPage) -> Self {
        Self {
            urls: gallery.items.iter().map(|item| item.url.as_str()).collect(),
            page: gallery.page,
            total_pages: gallery.total_pages,
            total: gallery.total,
            has_previous: gallery.has_previous(),
            has_next: gallery.has_next(),
        }
    }

    pub fn previous_page(&self) -> u32 {
        self.page.saturating_sub(1).max(1)
    }

    pub fn next_page(&self) -> u32 {
        self.page + 1
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    pub message: &'a str,
}

/// Headers attached to every rendered page
pub fn no_cache_headers() -> [(header::HeaderName, &'static str); 2] {
    [
        (header::CACHE_CONTROL, "no-cache"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    ]
}

/// Render `page` with the given status
pub fn render_page<T: Template>(status: StatusCode, page: &T) -> Response {
    match page.render() {
        Ok(html) => (status, no_cache_headers(), Html(html)).into_response(),
        Err(e) => {
            error!("Failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error: page rendering failed")
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaRecord;

    #[test]
    fn test_login_page_escapes_site_key() {
        let html = LoginPage {
            site_key: "<key>",
            error: Some("Login failed"),
        }
        .render()
        .unwrap();

        assert!(html.contains("&lt;key&gt;"));
        assert!(html.contains("Login failed"));
    }

    #[test]
    fn test_gallery_lists_urls_and_pages() {
        let gallery = GalleryPage {
            items: vec![MediaRecord {
                url: "https://t/file/a.jpg".to_string(),
                file_id: "f".to_string(),
                message_id: 1,
                timestamp: 1,
            }],
            page: 2,
            total_pages: 3,
            total: 121,
        };
        let view = GalleryView::new(&gallery);
        assert_eq!(view.previous_page(), 1);
        assert_eq!(view.next_page(), 3);

        let html = view.render().unwrap();
        assert!(html.contains("a.jpg"));
        assert!(html.contains("2/3 (121)"));
        assert!(html.contains("?page=1"));
        assert!(html.contains("?page=3"));
    }

    #[test]
    fn test_render_page_sets_headers() {
        let response = render_page(StatusCode::OK, &ErrorPage { message: "x" });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }
}
