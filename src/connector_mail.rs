//! Email corpus connector.
//!
//! Walks an export directory of `.eml` files and yields parsed
//! [`EmailDocument`]s. Header decoding and MIME traversal are delegated to
//! `mailparse`; HTML parts are flattened to text with `html2text`. Messages
//! that fail to parse are skipped with a warning so one corrupt export
//! never aborts a scan.

use anyhow::{bail, Result};
use chrono::DateTime;
use globset::{Glob, GlobSet, GlobSetBuilder};
use mailparse::{MailHeaderMap, ParsedMail};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::EmailDocument;

pub fn scan_mailbox(config: &Config) -> Result<Vec<EmailDocument>> {
    let root = &config.mailbox.root;
    if !root.exists() {
        bail!("Mailbox root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.mailbox.include_globs)?;

    let mut docs = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(root).follow_links(config.mailbox.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }

        match parse_eml(path, &rel_str) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                eprintln!("Warning: skipping unparseable email {}: {}", rel_str, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        eprintln!("Warning: skipped {} unparseable emails", skipped);
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.file.cmp(&b.file));

    Ok(docs)
}

fn parse_eml(path: &Path, relative_path: &str) -> Result<EmailDocument> {
    let raw = std::fs::read(path)?;
    let mail = mailparse::parse_mail(&raw)?;

    let subject = mail
        .headers
        .get_first_value("Subject")
        .unwrap_or_default();
    let sender = mail.headers.get_first_value("From").unwrap_or_default();

    let date = mail
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.date_naive());

    let mut body = String::new();
    collect_text(&mail, &mut body)?;

    Ok(EmailDocument {
        file: relative_path.to_string(),
        subject,
        sender,
        date,
        body: body.trim().to_string(),
    })
}

/// Walk the MIME tree depth-first, appending every text part. HTML parts
/// are converted to plain text so keyword matching sees the visible words,
/// not the markup.
fn collect_text(part: &ParsedMail, out: &mut String) -> Result<()> {
    if part.subparts.is_empty() {
        match part.ctype.mimetype.as_str() {
            "text/plain" => out.push_str(&part.get_body()?),
            "text/html" => {
                let html = part.get_body()?;
                out.push_str(&html2text::from_read(html.as_bytes(), 80));
            }
            _ => {}
        }
        return Ok(());
    }

    for sub in &part.subparts {
        collect_text(sub, out)?;
    }
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
