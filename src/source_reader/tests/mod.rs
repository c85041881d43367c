use super::*;
use std::time::Duration;

const PODCAST_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
    <channel>
        <title>Programming Thomas</title>
        <link>https://example.com</link>
        <description>A show about code</description>
        <language>en-us</language>
        <copyright>2024 Thomas</copyright>
        <itunes:subtitle>Weekly code talk</itunes:subtitle>
        <itunes:summary>Thomas talks about programming.</itunes:summary>
        <itunes:image href="https://example.com/art.jpg"/>
        <itunes:category text="Technology">
            <itunes:category text="Software How-To"/>
        </itunes:category>
        <itunes:category text="Education"/>
        <item>
            <title>Episode 2</title>
            <description>&lt;p&gt;Second &lt;b&gt;episode&lt;/b&gt;&lt;/p&gt;</description>
            <pubDate>Tue, 16 Jan 2024 10:00:00 +0000</pubDate>
            <enclosure url="https://cdn.example.com/ep2.mp3" length="2048" type="audio/mpeg"/>
            <itunes:author>Thomas</itunes:author>
            <itunes:duration>1:02:03</itunes:duration>
            <itunes:summary>The second one</itunes:summary>
        </item>
        <item>
            <title>Show notes only</title>
            <description>No media here</description>
        </item>
        <item>
            <title>Episode 1</title>
            <pubDate>Mon, 15 Jan 2024 10:00:00 +0000</pubDate>
            <enclosure url="https://cdn.example.com/ep1.mp4" length="not-a-number" type="video/mp4"/>
            <itunes:duration>13:37</itunes:duration>
        </item>
    </channel>
</rss>"#;

const PODCAST_ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Atom Cast</title>
    <subtitle>Episodes over Atom</subtitle>
    <link rel="alternate" href="https://atom.example.com/"/>
    <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
    <updated>2024-01-15T10:00:00Z</updated>
    <logo>https://atom.example.com/logo.png</logo>
    <category term="Technology"/>
    <entry>
        <title>Atom Episode</title>
        <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
        <updated>2024-01-15T10:00:00Z</updated>
        <author><name>Ada</name></author>
        <summary>An episode delivered via Atom</summary>
        <link rel="enclosure" href="https://atom.example.com/ep.ogg" type="audio/ogg" length="512"/>
    </entry>
    <entry>
        <title>Text Post</title>
        <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6b</id>
        <updated>2024-01-14T10:00:00Z</updated>
        <link rel="alternate" href="https://atom.example.com/post"/>
    </entry>
</feed>"#;

#[test]
fn test_parse_rss_channel_metadata() {
    let document = parse_feed(PODCAST_RSS.as_bytes()).unwrap();

    assert_eq!(document.title, "Programming Thomas");
    assert_eq!(document.link, "https://example.com");
    assert_eq!(document.description, "A show about code");
    assert_eq!(document.language, "en-us");
    assert_eq!(document.copyright, "2024 Thomas");
    assert_eq!(document.subtitle, "Weekly code talk");
    assert_eq!(document.summary, "Thomas talks about programming.");
    assert_eq!(document.image, "https://example.com/art.jpg");
    assert_eq!(
        document.categories,
        vec!["Technology/Software How-To", "Education"]
    );
}

#[test]
fn test_parse_rss_items_keep_document_order_and_skip_missing_enclosures() {
    let document = parse_feed(PODCAST_RSS.as_bytes()).unwrap();

    assert_eq!(document.items.len(), 2, "entry without enclosure is skipped");

    let second = &document.items[0];
    assert_eq!(second.url, "https://cdn.example.com/ep2.mp3");
    assert_eq!(second.title, "Episode 2");
    assert_eq!(second.author, "Thomas");
    assert_eq!(second.summary, "The second one");
    assert_eq!(second.media_type, "audio/mpeg");
    assert_eq!(second.length, 2048);
    assert_eq!(second.duration, Duration::from_secs(3723));
    assert_eq!(second.pub_date, "Tue, 16 Jan 2024 10:00:00 +0000");
    assert_eq!(second.plain_text_description(), "Second episode");
    assert!(!second.needs_retrieval, "parsing never flags items");

    let first = &document.items[1];
    assert_eq!(first.url, "https://cdn.example.com/ep1.mp4");
    assert_eq!(first.length, 0, "unparsable length falls back to zero");
    assert_eq!(first.duration, Duration::from_secs(13 * 60 + 37));
    assert!(first.is_video());
}

#[test]
fn test_parse_atom_fallback() {
    let document = parse_feed(PODCAST_ATOM.as_bytes()).unwrap();

    assert_eq!(document.title, "Atom Cast");
    assert_eq!(document.subtitle, "Episodes over Atom");
    assert_eq!(document.link, "https://atom.example.com/");
    assert_eq!(document.image, "https://atom.example.com/logo.png");
    assert_eq!(document.categories, vec!["Technology"]);

    assert_eq!(document.items.len(), 1, "only entries with enclosures count");
    let item = &document.items[0];
    assert_eq!(item.url, "https://atom.example.com/ep.ogg");
    assert_eq!(item.title, "Atom Episode");
    assert_eq!(item.author, "Ada");
    assert_eq!(item.summary, "An episode delivered via Atom");
    assert_eq!(item.media_type, "audio/ogg");
    assert_eq!(item.length, 512);
    assert!(item.pub_date.contains("15 Jan 2024"));
    assert!(item.parsed_release_date().is_some());
}

#[test]
fn test_parse_invalid_document() {
    let result = parse_feed(b"this is definitely not xml");
    assert!(matches!(result, Err(Error::FeedParse(_))));
}

#[test]
fn test_parse_empty_channel() {
    let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Empty</title><link>https://e.com</link><description>d</description></channel></rss>"#;
    let document = parse_feed(rss.as_bytes()).unwrap();
    assert_eq!(document.title, "Empty");
    assert!(document.items.is_empty());
    assert!(document.categories.is_empty());
}

#[test]
fn test_parse_duration_formats() {
    assert_eq!(parse_duration("13:37"), Duration::from_secs(817));
    assert_eq!(parse_duration("1:02:03"), Duration::from_secs(3723));
    assert_eq!(parse_duration("3600"), Duration::from_secs(3600));
    assert_eq!(parse_duration(" 5 : 07 "), Duration::from_secs(307));
    assert_eq!(parse_duration("x:30"), Duration::from_secs(30));
    assert_eq!(parse_duration("2:x:10"), Duration::from_secs(7210));
    assert_eq!(parse_duration(""), Duration::ZERO);
    assert_eq!(parse_duration("9:1:00:00"), Duration::from_secs(3600));
}

#[tokio::test]
async fn test_http_source_fetches_and_parses() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/rss+xml")
                .set_body_string(PODCAST_RSS),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = HttpFeedSource::new(&Config::default()).unwrap();
    let url = format!("{}/feed.xml", mock_server.uri());
    let document = source.fetch(&url).await.unwrap();

    assert_eq!(document.title, "Programming Thomas");
    assert_eq!(document.items.len(), 2);
}

#[tokio::test]
async fn test_http_source_reports_status_errors() {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let source = HttpFeedSource::new(&Config::default()).unwrap();
    let url = format!("{}/missing.xml", mock_server.uri());

    match source.fetch(&url).await {
        Err(Error::HttpStatus { status, url: failed }) => {
            assert_eq!(status, 404);
            assert_eq!(failed, url);
        }
        other => panic!("expected HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_source_unreachable_host() {
    let source = HttpFeedSource::new(&Config::default()).unwrap();
    // Port 9 (discard) on localhost is essentially never listening
    let result = source.fetch("http://127.0.0.1:9/feed.xml").await;
    assert!(result.unwrap_err().is_fetch_error());
}
