//! Streaming RSS 2.0 / Atom 1.0 parser.
//!
//! The document is read in a single forward pass of quick-xml events; nothing
//! is buffered beyond the item currently being assembled. Element names are
//! matched by their qualified form (`content:encoded`, `media:content`), which
//! is how feeds spell them in practice.
//!
//! SEC-002: quick-xml never expands DOCTYPE entity declarations, so custom
//! entities fail to unescape instead of being resolved (no XXE).

use std::io::BufRead;

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use url::Url;

use crate::storage::Article;
use crate::util::{parse_date_or_now, strip_html};

const UNTITLED_ARTICLE: &str = "Untitled";
const UNTITLED_FEED: &str = "Untitled Feed";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Not an RSS or Atom document (root element <{0}>)")]
    UnknownFormat(String),
    #[error("Empty document")]
    Empty,
    /// The document ended inside an open element
    #[error("Unexpected end of document")]
    UnexpectedEof,
}

/// A fully parsed feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    pub site_url: Option<String>,
    pub description: Option<String>,
    pub articles: Vec<Article>,
}

/// Channel-level title and site link, read without touching the items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedInfo {
    pub title: String,
    pub link: Option<String>,
}

// ============================================================================
// Owned event stream
// ============================================================================

#[derive(Debug)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Atom links count as the page link when `rel` is absent or `alternate`.
    fn is_alternate_link(&self) -> bool {
        matches!(self.attr("rel"), None | Some("alternate"))
    }
}

#[derive(Debug)]
enum Node {
    Open(Element),
    Leaf(Element),
    Close,
    Text(String),
    Eof,
}

struct XmlStream<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> XmlStream<R> {
    fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
        }
    }

    /// Next structural event. Declarations, comments, PIs and DOCTYPE are skipped.
    fn next(&mut self) -> Result<Node, ParseError> {
        loop {
            self.buf.clear();
            let decoder = self.reader.decoder();
            let node = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Node::Open(element(&e, decoder)),
                Event::Empty(e) => Node::Leaf(element(&e, decoder)),
                Event::End(_) => Node::Close,
                // Unknown HTML entities (&nbsp; etc.) fail XML unescaping; keep
                // them raw so strip_html can decode them later.
                Event::Text(t) => Node::Text(match t.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                }),
                Event::CData(c) => Node::Text(String::from_utf8_lossy(&c).into_owned()),
                Event::Eof => Node::Eof,
                _ => continue,
            };
            return Ok(node);
        }
    }

    /// Concatenated text of the element just opened, nested markup included.
    fn read_text(&mut self) -> Result<String, ParseError> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.next()? {
                Node::Text(t) => {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(&t);
                }
                Node::Open(_) => depth += 1,
                Node::Close if depth == 0 => return Ok(text),
                Node::Close => depth -= 1,
                Node::Leaf(_) => {}
                Node::Eof => return Err(ParseError::UnexpectedEof),
            }
        }
    }

    /// Skip the rest of the element just opened.
    fn skip(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            match self.next()? {
                Node::Open(_) => depth += 1,
                Node::Close if depth == 0 => return Ok(()),
                Node::Close => depth -= 1,
                Node::Eof => return Err(ParseError::UnexpectedEof),
                Node::Leaf(_) | Node::Text(_) => {}
            }
        }
    }

    /// The root element, or `Empty` if the document has none.
    fn root(&mut self) -> Result<(Element, bool), ParseError> {
        loop {
            match self.next()? {
                Node::Open(e) => return Ok((e, true)),
                Node::Leaf(e) => return Ok((e, false)),
                Node::Eof => return Err(ParseError::Empty),
                Node::Close | Node::Text(_) => {}
            }
        }
    }
}

fn element(start: &BytesStart<'_>, decoder: Decoder) -> Element {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let attrs = start
        .attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.decode_and_unescape_value(decoder) {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            (key, value)
        })
        .collect();
    Element { name, attrs }
}

// ============================================================================
// Item assembly
// ============================================================================

/// Raw fields of one `item`/`entry` as they appear in the document.
#[derive(Default)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    author: Option<String>,
    fallback_author: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    guid: Option<String>,
    image_url: Option<String>,
}

fn set_first(slot: &mut Option<String>, value: String) {
    if slot.is_none() && !value.trim().is_empty() {
        *slot = Some(value);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve a possibly relative link against the feed's own URL.
fn absolutize(link: String, base: Option<&Url>) -> String {
    if Url::parse(&link).is_ok() {
        return link;
    }
    base.and_then(|b| b.join(&link).ok())
        .map(String::from)
        .unwrap_or(link)
}

impl RawItem {
    fn into_article(self, feed_id: &str, base: Option<&Url>) -> Article {
        let title = self
            .title
            .map(|t| strip_html(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_ARTICLE.to_string());

        let link = non_empty(self.link).map(|l| absolutize(l, base));
        let guid = non_empty(self.guid).or_else(|| link.clone());
        let summary = self
            .summary
            .as_deref()
            .or(self.content.as_deref())
            .map(strip_html)
            .unwrap_or_default();
        let published = self
            .published
            .or(self.updated)
            .map(|d| parse_date_or_now(&d))
            .unwrap_or_else(|| parse_date_or_now(""));

        Article {
            id: uuid::Uuid::new_v4().to_string(),
            guid,
            title,
            summary,
            content: non_empty(self.content),
            link,
            author: non_empty(self.author).or_else(|| non_empty(self.fallback_author)),
            published,
            feed_id: feed_id.to_string(),
            feed_title: String::new(),
            image_url: non_empty(self.image_url),
            is_read: false,
            is_saved: false,
        }
    }
}

// ============================================================================
// Full parse
// ============================================================================

#[derive(Default)]
struct FeedHeader {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
}

/// Parse an RSS or Atom document into a feed and its articles.
///
/// Every article gets a fresh id and carries `feed_id` and the final feed
/// title. Relative article links are resolved against `feed_url`.
///
/// # Errors
///
/// - [`ParseError::Empty`] if the document has no root element
/// - [`ParseError::UnknownFormat`] if the root is neither `rss` nor `feed`
/// - [`ParseError::Xml`] on malformed XML
/// - [`ParseError::UnexpectedEof`] if the document is cut off inside an element
pub fn parse_feed<R: BufRead>(
    source: R,
    feed_id: &str,
    feed_url: &str,
) -> Result<ParsedFeed, ParseError> {
    let mut stream = XmlStream::new(source);
    let base = Url::parse(feed_url).ok();
    let (root, has_children) = stream.root()?;

    let mut header = FeedHeader::default();
    let mut articles = Vec::new();

    match root.name.as_str() {
        "rss" if has_children => {
            parse_rss(&mut stream, &mut header, &mut articles, feed_id, base.as_ref())?
        }
        "feed" if has_children => {
            parse_atom(&mut stream, &mut header, &mut articles, feed_id, base.as_ref())?
        }
        "rss" | "feed" => {}
        other => return Err(ParseError::UnknownFormat(other.to_string())),
    }

    let title = header
        .title
        .map(|t| strip_html(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_FEED.to_string());

    for article in &mut articles {
        article.feed_title = title.clone();
    }

    Ok(ParsedFeed {
        title,
        site_url: non_empty(header.link).map(|l| absolutize(l, base.as_ref())),
        description: header.description.map(|d| strip_html(&d)).filter(|d| !d.is_empty()),
        articles,
    })
}

fn parse_rss<R: BufRead>(
    stream: &mut XmlStream<R>,
    header: &mut FeedHeader,
    articles: &mut Vec<Article>,
    feed_id: &str,
    base: Option<&Url>,
) -> Result<(), ParseError> {
    let mut depth = 0usize;
    loop {
        match stream.next()? {
            // <rss> holds <channel>; descend into it transparently
            Node::Open(e) if e.name == "channel" => depth += 1,
            Node::Open(e) => match e.name.as_str() {
                "title" => set_first(&mut header.title, stream.read_text()?),
                "link" => set_first(&mut header.link, stream.read_text()?),
                "description" => set_first(&mut header.description, stream.read_text()?),
                "item" => articles.push(parse_rss_item(stream)?.into_article(feed_id, base)),
                _ => stream.skip()?,
            },
            Node::Leaf(e) if e.name == "item" => {
                articles.push(RawItem::default().into_article(feed_id, base))
            }
            Node::Close if depth == 0 => return Ok(()),
            Node::Close => depth -= 1,
            Node::Eof => return Err(ParseError::UnexpectedEof),
            Node::Leaf(_) | Node::Text(_) => {}
        }
    }
}

fn parse_rss_item<R: BufRead>(stream: &mut XmlStream<R>) -> Result<RawItem, ParseError> {
    let mut item = RawItem::default();
    loop {
        match stream.next()? {
            Node::Open(e) => {
                match e.name.as_str() {
                    "title" => set_first(&mut item.title, stream.read_text()?),
                    "link" => set_first(&mut item.link, stream.read_text()?),
                    "description" => set_first(&mut item.summary, stream.read_text()?),
                    "content:encoded" => set_first(&mut item.content, stream.read_text()?),
                    "author" => set_first(&mut item.author, stream.read_text()?),
                    "dc:creator" => set_first(&mut item.fallback_author, stream.read_text()?),
                    "pubDate" => set_first(&mut item.published, stream.read_text()?),
                    "guid" => set_first(&mut item.guid, stream.read_text()?),
                    _ => {
                        take_rss_image(&mut item, &e);
                        stream.skip()?;
                    }
                }
            }
            Node::Leaf(e) => take_rss_image(&mut item, &e),
            Node::Close => return Ok(item),
            Node::Eof => return Err(ParseError::UnexpectedEof),
            Node::Text(_) => {}
        }
    }
}

fn take_rss_image(item: &mut RawItem, e: &Element) {
    let url = match e.name.as_str() {
        "media:content" => e.attr("url"),
        "enclosure" if e.attr("type").is_some_and(|t| t.starts_with("image/")) => e.attr("url"),
        _ => None,
    };
    if let Some(url) = url {
        set_first(&mut item.image_url, url.to_string());
    }
}

fn parse_atom<R: BufRead>(
    stream: &mut XmlStream<R>,
    header: &mut FeedHeader,
    articles: &mut Vec<Article>,
    feed_id: &str,
    base: Option<&Url>,
) -> Result<(), ParseError> {
    loop {
        match stream.next()? {
            Node::Open(e) => match e.name.as_str() {
                "title" => set_first(&mut header.title, stream.read_text()?),
                "subtitle" => set_first(&mut header.description, stream.read_text()?),
                "link" => {
                    take_atom_link(&mut header.link, &e);
                    stream.skip()?;
                }
                "entry" => articles.push(parse_atom_entry(stream)?.into_article(feed_id, base)),
                _ => stream.skip()?,
            },
            Node::Leaf(e) if e.name == "link" => take_atom_link(&mut header.link, &e),
            Node::Leaf(e) if e.name == "entry" => {
                articles.push(RawItem::default().into_article(feed_id, base))
            }
            Node::Close => return Ok(()),
            Node::Eof => return Err(ParseError::UnexpectedEof),
            Node::Leaf(_) | Node::Text(_) => {}
        }
    }
}

fn parse_atom_entry<R: BufRead>(stream: &mut XmlStream<R>) -> Result<RawItem, ParseError> {
    let mut item = RawItem::default();
    loop {
        match stream.next()? {
            Node::Open(e) => match e.name.as_str() {
                "title" => set_first(&mut item.title, stream.read_text()?),
                "summary" => set_first(&mut item.summary, stream.read_text()?),
                "content" => set_first(&mut item.content, stream.read_text()?),
                "published" => set_first(&mut item.published, stream.read_text()?),
                "updated" => set_first(&mut item.updated, stream.read_text()?),
                "id" => set_first(&mut item.guid, stream.read_text()?),
                "author" => {
                    if let Some(name) = read_atom_author(stream)? {
                        set_first(&mut item.author, name);
                    }
                }
                "link" => {
                    take_atom_link(&mut item.link, &e);
                    stream.skip()?;
                }
                _ => {
                    take_atom_image(&mut item, &e);
                    stream.skip()?;
                }
            },
            Node::Leaf(e) if e.name == "link" => take_atom_link(&mut item.link, &e),
            Node::Leaf(e) => take_atom_image(&mut item, &e),
            Node::Close => return Ok(item),
            Node::Eof => return Err(ParseError::UnexpectedEof),
            Node::Text(_) => {}
        }
    }
}

fn read_atom_author<R: BufRead>(stream: &mut XmlStream<R>) -> Result<Option<String>, ParseError> {
    let mut name = None;
    loop {
        match stream.next()? {
            Node::Open(e) if e.name == "name" => set_first(&mut name, stream.read_text()?),
            Node::Open(_) => stream.skip()?,
            Node::Close => return Ok(name),
            Node::Eof => return Err(ParseError::UnexpectedEof),
            Node::Leaf(_) | Node::Text(_) => {}
        }
    }
}

fn take_atom_link(slot: &mut Option<String>, e: &Element) {
    if e.is_alternate_link() {
        if let Some(href) = e.attr("href") {
            set_first(slot, href.to_string());
        }
    }
}

fn take_atom_image(item: &mut RawItem, e: &Element) {
    if matches!(e.name.as_str(), "media:thumbnail" | "media:content") {
        if let Some(url) = e.attr("url") {
            set_first(&mut item.image_url, url.to_string());
        }
    }
}

// ============================================================================
// Feed info (short-circuit)
// ============================================================================

/// Read just the feed title and site link.
///
/// Stops at the first item/entry or as soon as both are known, so a large
/// document costs only its header. The link is an element's `href`
/// attribute when present (Atom), else its text (RSS).
pub fn parse_feed_info<R: BufRead>(source: R) -> Result<FeedInfo, ParseError> {
    let mut stream = XmlStream::new(source);
    let (root, has_children) = stream.root()?;
    if root.name != "rss" && root.name != "feed" {
        return Err(ParseError::UnknownFormat(root.name));
    }

    let mut title = None;
    let mut link = None;

    if has_children {
        loop {
            if title.is_some() && link.is_some() {
                break;
            }
            match stream.next()? {
                Node::Open(e) if e.name == "channel" => {}
                Node::Open(e) => match e.name.as_str() {
                    "title" => set_first(&mut title, stream.read_text()?),
                    "link" => match e.attr("href") {
                        Some(href) => {
                            if e.is_alternate_link() {
                                set_first(&mut link, href.to_string());
                            }
                            stream.skip()?;
                        }
                        None => set_first(&mut link, stream.read_text()?),
                    },
                    "item" | "entry" => break,
                    _ => stream.skip()?,
                },
                Node::Leaf(e) if e.name == "link" && e.is_alternate_link() => {
                    if let Some(href) = e.attr("href") {
                        set_first(&mut link, href.to_string());
                    }
                }
                Node::Close => break,
                Node::Eof => return Err(ParseError::UnexpectedEof),
                Node::Leaf(_) | Node::Text(_) => {}
            }
        }
    }

    Ok(FeedInfo {
        title: title
            .map(|t| strip_html(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_FEED.to_string()),
        link: non_empty(link),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FEED_URL: &str = "https://example.com/feed.xml";

    fn parse(xml: &str) -> Result<ParsedFeed, ParseError> {
        parse_feed(xml.as_bytes(), "feed-1", FEED_URL)
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"
     xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:dc="http://purl.org/dc/elements/1.1/"
     xmlns:media="http://search.yahoo.com/mrss/"
     xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Example &amp; Co</title>
    <atom:link href="https://example.com/feed.xml" rel="self" type="application/rss+xml"/>
    <link>https://example.com/</link>
    <description><![CDATA[<p>All the <b>news</b></p>]]></description>
    <image><title>Logo</title><url>https://example.com/logo.png</url></image>
    <item>
      <title>&lt;b&gt;First&lt;/b&gt; &amp; best</title>
      <link>https://example.com/1</link>
      <description><![CDATA[<p>Hello&nbsp;<em>world</em></p>]]></description>
      <content:encoded><![CDATA[<p>Full body</p>]]></content:encoded>
      <dc:creator>Jane</dc:creator>
      <pubDate>Mon, 15 Jan 2024 10:30:00 +0000</pubDate>
      <guid isPermaLink="false"> abc-1 </guid>
      <media:content url="https://example.com/1.jpg" medium="image"/>
    </item>
    <item>
      <title></title>
      <link>/2</link>
      <author>bob@example.com</author>
      <pubDate>garbage</pubDate>
      <enclosure url="https://example.com/2.mp3" type="audio/mpeg"/>
      <enclosure url="https://example.com/2.png" type="image/png"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_rss_channel_fields() {
        let feed = parse(RSS).unwrap();
        assert_eq!(feed.title, "Example & Co");
        assert_eq!(feed.site_url.as_deref(), Some("https://example.com/"));
        assert_eq!(feed.description.as_deref(), Some("All the news"));
        assert_eq!(feed.articles.len(), 2);
    }

    #[test]
    fn test_rss_item_fields() {
        let feed = parse(RSS).unwrap();
        let first = &feed.articles[0];
        assert_eq!(first.title, "First & best");
        assert_eq!(first.link.as_deref(), Some("https://example.com/1"));
        assert_eq!(first.summary, "Hello world");
        assert_eq!(first.content.as_deref(), Some("<p>Full body</p>"));
        assert_eq!(first.author.as_deref(), Some("Jane"));
        assert_eq!(first.published, 1_705_314_600_000);
        assert_eq!(first.guid.as_deref(), Some("abc-1"));
        assert_eq!(first.image_url.as_deref(), Some("https://example.com/1.jpg"));
        assert_eq!(first.feed_id, "feed-1");
        assert_eq!(first.feed_title, "Example & Co");
        assert!(!first.is_read && !first.is_saved);
    }

    #[test]
    fn test_rss_item_fallbacks() {
        let before = chrono::Utc::now().timestamp_millis();
        let feed = parse(RSS).unwrap();
        let second = &feed.articles[1];
        assert_eq!(second.title, "Untitled");
        // Relative link resolved, and used as guid
        assert_eq!(second.link.as_deref(), Some("https://example.com/2"));
        assert_eq!(second.guid.as_deref(), Some("https://example.com/2"));
        assert_eq!(second.author.as_deref(), Some("bob@example.com"));
        assert!(second.published >= before);
        assert_eq!(second.image_url.as_deref(), Some("https://example.com/2.png"));
        assert_eq!(second.summary, "");
    }

    #[test]
    fn test_article_ids_are_unique() {
        let feed = parse(RSS).unwrap();
        assert_ne!(feed.articles[0].id, feed.articles[1].id);
    }

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <title type="text">Atom Example</title>
  <subtitle>Things happen</subtitle>
  <link rel="self" href="https://example.org/atom.xml"/>
  <link href="https://example.org/"/>
  <author><name>Feed Author</name></author>
  <updated>2024-01-15T10:30:00Z</updated>
  <entry>
    <title>Entry One</title>
    <link rel="enclosure" href="https://example.org/one.mp3"/>
    <link rel="alternate" href="https://example.org/one"/>
    <id>urn:uuid:1</id>
    <published>2024-01-15T10:30:00Z</published>
    <updated>2024-02-01T00:00:00Z</updated>
    <author><name>Alice</name><email>a@example.org</email></author>
    <summary type="html">&lt;p&gt;Short&lt;/p&gt;</summary>
    <content type="html">&lt;p&gt;Long form&lt;/p&gt;</content>
    <media:thumbnail url="https://example.org/thumb.jpg"/>
    <media:content url="https://example.org/big.jpg"/>
  </entry>
  <entry>
    <title>Entry Two</title>
    <link href="https://example.org/two"/>
    <id>   </id>
    <updated>2024-01-15T12:30:00+02:00</updated>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Inline</p></div></content>
  </entry>
</feed>"#;

    #[test]
    fn test_atom_feed_fields() {
        let feed = parse(ATOM).unwrap();
        assert_eq!(feed.title, "Atom Example");
        assert_eq!(feed.site_url.as_deref(), Some("https://example.org/"));
        assert_eq!(feed.description.as_deref(), Some("Things happen"));
        assert_eq!(feed.articles.len(), 2);
    }

    #[test]
    fn test_atom_entry_fields() {
        let feed = parse(ATOM).unwrap();
        let one = &feed.articles[0];
        assert_eq!(one.title, "Entry One");
        assert_eq!(one.link.as_deref(), Some("https://example.org/one"));
        assert_eq!(one.guid.as_deref(), Some("urn:uuid:1"));
        assert_eq!(one.published, 1_705_314_600_000);
        assert_eq!(one.author.as_deref(), Some("Alice"));
        assert_eq!(one.summary, "Short");
        assert_eq!(one.content.as_deref(), Some("<p>Long form</p>"));
        assert_eq!(one.image_url.as_deref(), Some("https://example.org/thumb.jpg"));
        assert_eq!(one.feed_title, "Atom Example");
    }

    #[test]
    fn test_atom_updated_and_guid_fallback() {
        let feed = parse(ATOM).unwrap();
        let two = &feed.articles[1];
        assert_eq!(two.published, 1_705_314_600_000);
        assert_eq!(two.guid.as_deref(), Some("https://example.org/two"));
        // No summary: plain text of the content stands in
        assert_eq!(two.summary, "Inline");
    }

    #[test]
    fn test_empty_titles_get_defaults() {
        let feed = parse("<rss><channel><title>  </title></channel></rss>").unwrap();
        assert_eq!(feed.title, "Untitled Feed");
        assert!(feed.articles.is_empty());

        let feed = parse("<rss><channel><item><guid>g</guid></item></channel></rss>").unwrap();
        assert_eq!(feed.title, "Untitled Feed");
        assert_eq!(feed.articles[0].title, "Untitled");
        assert_eq!(feed.articles[0].feed_title, "Untitled Feed");
    }

    #[test]
    fn test_missing_guid_and_link() {
        let feed = parse("<rss><channel><item><title>x</title></item></channel></rss>").unwrap();
        assert_eq!(feed.articles[0].guid, None);
        assert_eq!(feed.articles[0].link, None);
    }

    #[test]
    fn test_self_closing_root() {
        let feed = parse("<feed/>").unwrap();
        assert_eq!(feed.title, "Untitled Feed");
        assert!(feed.articles.is_empty());
    }

    #[test]
    fn test_unknown_root_rejected() {
        assert!(matches!(
            parse("<html><body>nope</body></html>"),
            Err(ParseError::UnknownFormat(root)) if root == "html"
        ));
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(parse(""), Err(ParseError::Empty)));
        assert!(matches!(parse("<?xml version=\"1.0\"?>"), Err(ParseError::Empty)));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(matches!(
            parse("<rss><channel><title>x</wrong></channel></rss>"),
            Err(ParseError::Xml(_))
        ));
    }

    #[test]
    fn test_truncated_document_rejected() {
        let xml = "<rss><channel><title>T</title><item><title>A</title><guid>g1</guid>";
        assert!(matches!(parse(xml), Err(ParseError::UnexpectedEof)));

        // Cut off between items, and inside a text element
        let xml = "<rss><channel><title>T</title><item><guid>g1</guid></item>";
        assert!(matches!(parse(xml), Err(ParseError::UnexpectedEof)));
        assert!(matches!(
            parse("<rss><channel><title>T"),
            Err(ParseError::UnexpectedEof)
        ));

        let xml = "<feed><title>T</title><entry><id>1</id><author><name>A</name>";
        assert!(matches!(parse(xml), Err(ParseError::UnexpectedEof)));
    }

    #[test]
    fn test_feed_info_rejects_truncated_header() {
        assert!(matches!(
            parse_feed_info("<rss><channel><title>T</title>".as_bytes()),
            Err(ParseError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_self_closing_item_yields_untitled_article() {
        let feed = parse("<rss><channel><title>T</title><item/></channel></rss>").unwrap();
        assert_eq!(feed.articles.len(), 1);
        assert_eq!(feed.articles[0].title, "Untitled");
        assert_eq!(feed.articles[0].guid, None);
        assert_eq!(feed.articles[0].feed_title, "T");

        let feed = parse("<feed><title>T</title><entry/><entry/></feed>").unwrap();
        assert_eq!(feed.articles.len(), 2);
        assert!(feed.articles.iter().all(|a| a.title == "Untitled"));
    }

    #[test]
    fn test_unknown_nested_elements_skipped() {
        let xml = r#"<rss><channel>
            <ext><title>not the feed title</title><deep><item>no</item></deep></ext>
            <title>Real</title>
            <item><ext><title>not the item title</title></ext><title>Item</title></item>
        </channel></rss>"#;
        let feed = parse(xml).unwrap();
        assert_eq!(feed.title, "Real");
        assert_eq!(feed.articles.len(), 1);
        assert_eq!(feed.articles[0].title, "Item");
    }

    #[test]
    fn test_feed_info_rss() {
        let info = parse_feed_info(RSS.as_bytes()).unwrap();
        assert_eq!(
            info,
            FeedInfo {
                title: "Example & Co".to_string(),
                link: Some("https://example.com/".to_string()),
            }
        );
    }

    #[test]
    fn test_feed_info_atom_uses_alternate_href() {
        let info = parse_feed_info(ATOM.as_bytes()).unwrap();
        assert_eq!(info.title, "Atom Example");
        assert_eq!(info.link.as_deref(), Some("https://example.org/"));
    }

    #[test]
    fn test_feed_info_stops_before_broken_tail() {
        // Everything after the header is garbage; the short-circuit never reads it
        let xml = "<rss><channel><title>T</title><link>https://x.example/</link><item></oops>";
        let info = parse_feed_info(xml.as_bytes()).unwrap();
        assert_eq!(info.title, "T");
    }

    #[test]
    fn test_feed_info_rejects_html() {
        assert!(matches!(
            parse_feed_info("<!DOCTYPE html><html></html>".as_bytes()),
            Err(ParseError::UnknownFormat(_))
        ));
    }
}
