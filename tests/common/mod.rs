#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::get;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Request counter shared with a fixture route.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Router answering `path` with `body` as HTML and counting requests.
pub fn html_route(router: Router, path: &str, body: &'static str, hits: &Hits) -> Router {
    let hits = hits.clone();
    router.route(
        path,
        get(move || {
            let hits = hits.clone();
            async move {
                hits.bump();
                Html(body)
            }
        }),
    )
}

pub fn pdf_route(router: Router, path: &str, bytes: Vec<u8>) -> Router {
    router.route(
        path,
        get(move || {
            let bytes = bytes.clone();
            async move { ([(header::CONTENT_TYPE, "application/pdf")], bytes) }
        }),
    )
}

/// Sends the first bytes of a PDF, then breaks the connection.
pub fn truncated_pdf_route(router: Router, path: &str) -> Router {
    router.route(
        path,
        get(|| async {
            let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
                Ok(b"%PDF-1.4\n1 0 obj".to_vec()),
                Err(std::io::Error::other("connection reset")),
            ];
            Body::from_stream(futures::stream::iter(parts))
        }),
    )
}

pub fn status_route(router: Router, path: &str, status: StatusCode) -> Router {
    router.route(path, get(move || async move { status.into_response() }))
}

/// Serves a single HTML page at `/` and returns its URL and hit counter.
pub async fn serve_page(body: &'static str) -> (String, Hits) {
    let hits = Hits::default();
    let base = serve(html_route(Router::new(), "/", body, &hits)).await;
    (format!("{base}/"), hits)
}

/// A URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// Minimal PDF with one page per entry, Helvetica text; empty entries give blank pages.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let page_count = pages.len();
    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {page_count} >>",
            (0..page_count)
                .map(|i| format!("{} 0 R", 4 + 2 * i))
                .collect::<Vec<_>>()
                .join(" ")
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 18 Tf 72 720 Td ({text}) Tj ET")
        };
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{object}\nendobj\n", i + 1));
    }
    let xref = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    ));
    out.into_bytes()
}
