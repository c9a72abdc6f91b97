use std::ffi::OsString;
use std::path::{Path, PathBuf};

use reqwest::{Client, Response, Url};
use scraper::{Html, Selector};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{AcquireError, Result};
use crate::fetch::get_text;

/// Loads `page_url` and returns the absolute `href` of the first element matching `selector`.
pub async fn resolve_link(client: &Client, page_url: &str, selector: &str) -> Result<String> {
    let selector_parsed = Selector::parse(selector).map_err(|err| AcquireError::InvalidSelector {
        selector: selector.to_string(),
        reason: err.to_string(),
    })?;

    let page = get_text(client, page_url).await?;
    let href = {
        let doc = Html::parse_document(&page);
        // Sources list the current week's menu first; later matches are older menus.
        doc.select(&selector_parsed)
            .next()
            .and_then(|element| element.value().attr("href"))
            .map(str::to_string)
    };
    let href = href.ok_or_else(|| AcquireError::NoLinkFound {
        url: page_url.to_string(),
        selector: selector.to_string(),
    })?;

    let link = match Url::parse(page_url).and_then(|base| base.join(&href)) {
        Ok(link) => link.to_string(),
        Err(_) => href,
    };
    info!(url = %link, "found PDF menu link");
    Ok(link)
}

/// Streams `pdf_url` into `dest`, replacing whatever is there.
pub async fn download(client: &Client, pdf_url: &str, dest: &Path) -> Result<()> {
    let mut response = client
        .get(pdf_url)
        .send()
        .await
        .map_err(|err| AcquireError::transport(pdf_url, err))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AcquireError::Status {
            url: pdf_url.to_string(),
            status,
        });
    }

    if let Some(dir) = dest.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| AcquireError::io(dir, err))?;
    }

    // `dest` is only replaced once the whole body has arrived.
    let partial = partial_path(dest);
    let written = match write_body(&mut response, pdf_url, &partial).await {
        Ok(written) => written,
        Err(err) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                debug!(
                    path = %partial.display(),
                    error = %cleanup,
                    "could not remove partial download"
                );
            }
            return Err(err);
        }
    };
    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|err| AcquireError::io(dest, err))?;

    debug!(url = %pdf_url, path = %dest.display(), bytes = written, "downloaded PDF");
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_body(response: &mut Response, pdf_url: &str, path: &Path) -> Result<usize> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|err| AcquireError::io(path, err))?;

    let mut written = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| AcquireError::transport(pdf_url, err))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|err| AcquireError::io(path, err))?;
        written += chunk.len();
    }
    file.flush().await.map_err(|err| AcquireError::io(path, err))?;
    Ok(written)
}

/// Extracts text from at most `max_pages` pages; `0` means every page.
/// Blocking, run it on a blocking thread from async code.
pub fn extract_text(pdf_path: &Path, max_pages: usize) -> Result<String> {
    let pages = extract_pages(pdf_path)?;
    Ok(render_pages(&pages, max_pages))
}

/// Raw text of every page, in page order.
pub fn extract_pages(pdf_path: &Path) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_by_pages(pdf_path).map_err(|err| AcquireError::Pdf {
        path: pdf_path.to_path_buf(),
        reason: err.to_string(),
    })?;
    debug!(path = %pdf_path.display(), pages = pages.len(), "read PDF");
    Ok(pages)
}

/// Number of pages actually read: `0` or anything past the end means all of them.
pub fn page_limit(page_count: usize, max_pages: usize) -> usize {
    if max_pages == 0 || max_pages > page_count {
        page_count
    } else {
        max_pages
    }
}

/// True when none of the first `max_pages` pages carries any text.
pub fn is_blank(pages: &[String], max_pages: usize) -> bool {
    pages
        .iter()
        .take(page_limit(pages.len(), max_pages))
        .all(|page| page.trim().is_empty())
}

/// Lays out per-page text as delimited blocks. Pages without text still get a block.
pub fn render_pages(pages: &[String], max_pages: usize) -> String {
    let limit = page_limit(pages.len(), max_pages);

    let mut out = String::new();
    for (index, page) in pages.iter().take(limit).enumerate() {
        let number = index + 1;
        let runs: Vec<&str> = page.split_whitespace().collect();
        if runs.is_empty() {
            out.push_str(&format!("--- Page {number} [No text content found] ---\n\n"));
        } else {
            out.push_str(&format!("--- Page {number} ---\n"));
            out.push_str(&runs.join(" "));
            out.push_str("\n\n");
        }
    }
    out
}
