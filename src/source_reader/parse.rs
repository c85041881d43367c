//! Feed document parsing (RSS 2.0 + iTunes extension, Atom fallback).

use super::FeedDocument;
use crate::error::{Error, Result};
use crate::types::Item;
use std::time::Duration;
use tracing::debug;

/// Parse a feed document, trying RSS first and Atom second
///
/// # Errors
/// [`Error::FeedParse`] when the bytes are neither a valid RSS channel nor a
/// valid Atom feed.
pub fn parse_feed(content: &[u8]) -> Result<FeedDocument> {
    match parse_rss(content) {
        Ok(document) => Ok(document),
        Err(rss_err) => {
            debug!(error = %rss_err, "Document is not RSS, trying Atom");
            parse_atom(content).map_err(|atom_err| {
                Error::FeedParse(format!(
                    "Failed to parse feed as RSS or Atom. RSS error: {}. Atom error: {}",
                    rss_err, atom_err
                ))
            })
        }
    }
}

/// Parse a nominal duration formatted as `[[H:]M:]S`
///
/// "13:37" is 13 minutes 37 seconds, "1:02:03" is 1 hour 2 minutes 3 seconds,
/// "3600" is an hour. Components that are not integers count as zero, and
/// anything left of the hours component is ignored.
pub fn parse_duration(raw: &str) -> Duration {
    let component = |part: Option<&str>| -> u64 {
        part.and_then(|p| p.trim().parse::<u64>().ok()).unwrap_or(0)
    };

    let mut parts = raw.rsplit(':');
    let seconds = component(parts.next());
    let minutes = component(parts.next());
    let hours = component(parts.next());

    Duration::from_secs(
        hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(seconds),
    )
}

fn parse_rss(content: &[u8]) -> std::result::Result<FeedDocument, rss::Error> {
    let channel = rss::Channel::read_from(content)?;
    let itunes = channel.itunes_ext();

    let image = itunes
        .and_then(|ext| ext.image())
        .or_else(|| channel.image().map(|img| img.url()))
        .unwrap_or_default()
        .to_string();

    let mut categories: Vec<String> = itunes
        .map(|ext| {
            ext.categories()
                .iter()
                .map(|category| match category.subcategory() {
                    Some(sub) if !sub.text().is_empty() => {
                        format!("{}/{}", category.text(), sub.text())
                    }
                    _ => category.text().to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    if categories.is_empty() {
        categories = channel
            .categories()
            .iter()
            .map(|category| category.name().to_string())
            .collect();
    }

    let items = channel
        .items()
        .iter()
        .filter_map(|entry| {
            let Some(enclosure) = entry.enclosure().filter(|enc| !enc.url().is_empty()) else {
                debug!(
                    title = entry.title().unwrap_or_default(),
                    "Skipping entry without enclosure"
                );
                return None;
            };
            let ext = entry.itunes_ext();

            Some(Item {
                url: enclosure.url().to_string(),
                title: entry.title().unwrap_or_default().to_string(),
                author: entry
                    .author()
                    .or_else(|| ext.and_then(|e| e.author()))
                    .unwrap_or_default()
                    .to_string(),
                description: entry.description().unwrap_or_default().to_string(),
                summary: ext
                    .and_then(|e| e.summary().or_else(|| e.subtitle()))
                    .unwrap_or_default()
                    .to_string(),
                image: ext.and_then(|e| e.image()).unwrap_or_default().to_string(),
                pub_date: entry.pub_date().unwrap_or_default().to_string(),
                media_type: enclosure.mime_type().to_string(),
                length: enclosure.length().trim().parse().unwrap_or(0),
                duration: ext
                    .and_then(|e| e.duration())
                    .map(parse_duration)
                    .unwrap_or_default(),
                needs_retrieval: false,
            })
        })
        .collect();

    Ok(FeedDocument {
        title: channel.title().to_string(),
        link: channel.link().to_string(),
        language: channel.language().unwrap_or_default().to_string(),
        copyright: channel.copyright().unwrap_or_default().to_string(),
        subtitle: itunes
            .and_then(|ext| ext.subtitle())
            .unwrap_or_default()
            .to_string(),
        description: channel.description().to_string(),
        summary: itunes
            .and_then(|ext| ext.summary())
            .unwrap_or_default()
            .to_string(),
        image,
        categories,
        items,
    })
}

fn parse_atom(content: &[u8]) -> std::result::Result<FeedDocument, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content)?;

    let link = feed
        .links()
        .iter()
        .find(|link| link.rel() == "alternate")
        .or_else(|| feed.links().first())
        .map(|link| link.href().to_string())
        .unwrap_or_default();

    let items = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let enclosure = entry
                .links()
                .iter()
                .find(|link| link.rel() == "enclosure" && !link.href().is_empty())?;

            // Publication date (prefer published, fallback to updated)
            let published = entry.published().unwrap_or_else(|| entry.updated());

            Some(Item {
                url: enclosure.href().to_string(),
                title: entry.title().as_str().to_string(),
                author: entry
                    .authors()
                    .first()
                    .map(|person| person.name().to_string())
                    .unwrap_or_default(),
                description: entry
                    .content()
                    .and_then(|c| c.value())
                    .or_else(|| entry.summary().map(|s| s.as_str()))
                    .unwrap_or_default()
                    .to_string(),
                summary: entry
                    .summary()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                image: String::new(),
                pub_date: published.to_rfc2822(),
                media_type: enclosure.mime_type().unwrap_or_default().to_string(),
                length: enclosure
                    .length()
                    .and_then(|l| l.trim().parse().ok())
                    .unwrap_or(0),
                duration: Duration::ZERO,
                needs_retrieval: false,
            })
        })
        .collect();

    Ok(FeedDocument {
        title: feed.title().as_str().to_string(),
        link,
        language: String::new(),
        copyright: feed
            .rights()
            .map(|r| r.as_str().to_string())
            .unwrap_or_default(),
        subtitle: feed
            .subtitle()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        description: feed
            .subtitle()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        summary: String::new(),
        image: feed
            .logo()
            .or_else(|| feed.icon())
            .unwrap_or_default()
            .to_string(),
        categories: feed
            .categories()
            .iter()
            .map(|category| category.term().to_string())
            .collect(),
        items,
    })
}
