mod common;

use axum::Router;
use axum::http::StatusCode;
use lunch_menus::AcquireError;
use lunch_menus::fetch::build_client;
use lunch_menus::pdf::{download, extract_text, resolve_link};

use common::{
    Hits, html_route, pdf_route, pdf_with_pages, serve, status_route, truncated_pdf_route,
};

const LISTING: &str = r#"<html><body>
    <a class="pdf" href="/files/week-42.pdf">Aktuelle Woche</a>
    <a class="pdf" href="/files/week-41.pdf">Letzte Woche</a>
    <a class="other" href="https://elsewhere.test/flyer.pdf">Flyer</a>
</body></html>"#;

async fn listing_server() -> String {
    serve(html_route(Router::new(), "/mittag/", LISTING, &Hits::default())).await
}

#[tokio::test]
async fn first_match_wins_and_relative_links_are_resolved() {
    let base = listing_server().await;
    let link = resolve_link(&build_client().unwrap(), &format!("{base}/mittag/"), "a.pdf")
        .await
        .unwrap();

    assert_eq!(link, format!("{base}/files/week-42.pdf"));
}

#[tokio::test]
async fn absolute_links_are_kept() {
    let base = listing_server().await;
    let link = resolve_link(&build_client().unwrap(), &format!("{base}/mittag/"), "a.other")
        .await
        .unwrap();

    assert_eq!(link, "https://elsewhere.test/flyer.pdf");
}

#[tokio::test]
async fn no_match_is_reported_with_selector() {
    let base = listing_server().await;
    let err = resolve_link(&build_client().unwrap(), &format!("{base}/mittag/"), "a.menu")
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::NoLinkFound { ref selector, .. } if selector == "a.menu"));
}

#[tokio::test]
async fn invalid_selector_fails_before_loading_the_page() {
    let hits = Hits::default();
    let base = serve(html_route(Router::new(), "/", LISTING, &hits)).await;
    let err = resolve_link(&build_client().unwrap(), &format!("{base}/"), "a[")
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn download_replaces_an_existing_file() {
    let bytes = pdf_with_pages(&["Burger"]);
    let base = serve(pdf_route(Router::new(), "/menu.pdf", bytes.clone())).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("nested").join("menu.pdf");
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    std::fs::write(&dest, b"stale content from last week, longer than nothing").unwrap();

    download(&build_client().unwrap(), &format!("{base}/menu.pdf"), &dest)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), bytes);
}

#[tokio::test]
async fn download_creates_missing_directories() {
    let base = serve(pdf_route(Router::new(), "/menu.pdf", b"%PDF-".to_vec())).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a").join("b").join("menu.pdf");

    download(&build_client().unwrap(), &format!("{base}/menu.pdf"), &dest)
        .await
        .unwrap();

    assert!(dest.exists());
}

#[tokio::test]
async fn failed_download_leaves_no_file() {
    let base = serve(status_route(Router::new(), "/menu.pdf", StatusCode::NOT_FOUND)).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("menu.pdf");

    let err = download(&build_client().unwrap(), &format!("{base}/menu.pdf"), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Status { status, .. } if status == StatusCode::NOT_FOUND));
    assert!(!dest.exists());
}

#[tokio::test]
async fn interrupted_download_keeps_the_previous_file() {
    let base = serve(truncated_pdf_route(Router::new(), "/menu.pdf")).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("freibank_menu.pdf");
    std::fs::write(&dest, b"last week's menu").unwrap();

    let err = download(&build_client().unwrap(), &format!("{base}/menu.pdf"), &dest)
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(std::fs::read(&dest).unwrap(), b"last week's menu");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn extracts_pages_in_order_and_labels_blank_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menu.pdf");
    std::fs::write(&path, pdf_with_pages(&["Montag Burger", "", "Freitag Fisch"])).unwrap();

    let all = extract_text(&path, 0).unwrap();
    assert_eq!(all.matches("--- Page ").count(), 3);
    let first = all.find("Burger").unwrap();
    let blank = all.find("--- Page 2 [No text content found] ---").unwrap();
    let last = all.find("Fisch").unwrap();
    assert!(first < blank && blank < last);

    let one = extract_text(&path, 1).unwrap();
    assert!(one.starts_with("--- Page 1 ---\n"));
    assert!(one.contains("Burger"));
    assert!(!one.contains("Page 2"));

    assert_eq!(extract_text(&path, 99).unwrap(), all);
}

#[test]
fn corrupt_file_is_a_pdf_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menu.pdf");
    std::fs::write(&path, b"<html>not a pdf</html>").unwrap();

    let err = extract_text(&path, 1).unwrap_err();
    assert!(matches!(err, AcquireError::Pdf { .. }));
}
