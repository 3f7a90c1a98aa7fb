use anyhow::{Context, Result};
use tracing::{info, warn};

const PAGE_BREAK: char = '\u{000C}';

/// Pulls raw text out of PDF bytes. This is CPU bound and must run on a
/// blocking thread.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String> {
    let raw = pdf_extract::extract_text_from_mem(bytes).context("Failed to parse PDF")?;
    let text = normalize_pages(&raw);

    if text.is_empty() {
        warn!("No text extracted from PDF");
    } else {
        info!("Extracted {} characters from PDF", text.chars().count());
    }
    Ok(text)
}

/// Runs [`extract_pdf_text`] on the blocking pool. A panic inside the PDF
/// parser surfaces as an error instead of tearing down the worker.
pub async fn extract_pdf_text_blocking(bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
        .await
        .context("PDF extraction task aborted")?
}

/// Marks each non-empty page with a `--- Page N ---` header and collapses
/// whitespace runs inside every line.
pub fn normalize_pages(raw: &str) -> String {
    let mut out = String::new();

    for (index, page) in raw.split(PAGE_BREAK).enumerate() {
        let lines: Vec<String> = page
            .lines()
            .map(normalize_whitespace)
            .filter(|line| !line.is_empty())
            .collect();

        if lines.is_empty() {
            continue;
        }

        out.push_str(&format!("\n--- Page {} ---\n", index + 1));
        out.push_str(&lines.join("\n"));
        out.push('\n');
    }

    out.trim().to_string()
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  Attention \t is   all "), "Attention is all");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_pages_are_marked() {
        let raw = "Title   line\n\n  body  text \u{000C}\u{000C}second page";
        let text = normalize_pages(raw);
        assert_eq!(
            text,
            "--- Page 1 ---\nTitle line\nbody text\n\n--- Page 3 ---\nsecond page"
        );
    }

    #[test]
    fn test_blank_output_is_empty() {
        assert_eq!(normalize_pages(" \n \u{000C} \n"), "");
    }

    #[tokio::test]
    async fn test_extracts_single_page_pdf() {
        let pdf = include_bytes!("../../tests/fixtures/attention.pdf").to_vec();
        let text = extract_pdf_text_blocking(pdf).await.unwrap();
        assert!(text.starts_with("--- Page 1 ---"), "{}", text);
        assert!(text.contains("Transformer attention replaces recurrence."));
        assert!(text.contains("Graph methods are compared later."));
    }

    #[test]
    fn test_garbage_bytes_fail() {
        let result = std::panic::catch_unwind(|| extract_pdf_text(b"definitely not a pdf"));
        // the parser either reports an error or panics; it never yields text
        assert!(!matches!(result, Ok(Ok(ref text)) if !text.is_empty()));
    }
}
