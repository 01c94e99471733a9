use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;
use thiserror::Error;

use super::version::Version;

const ITEM_NODE: &[u8] = b"item";
const ENCLOSURE_NODE: &[u8] = b"enclosure";
const RELEASE_NOTES_LINK_NODE: &[u8] = b"sparkle:releaseNotesLink";
const VERSION_ATTRIBUTE: &[u8] = b"sparkle:version";
const DELTA_FROM_ATTRIBUTE: &[u8] = b"sparkle:deltaFrom";
const DSA_SIGNATURE_ATTRIBUTE: &[u8] = b"sparkle:dsaSignature";
const URL_ATTRIBUTE: &[u8] = b"url";

/// SEC-003: Maximum element nesting depth accepted in an appcast.
/// A real appcast is `rss > channel > item > enclosure`; anything this deep
/// is hostile or broken.
pub const MAX_FEED_DEPTH: usize = 64;

/// SEC-004: Maximum enclosures buffered for one item by an unfiltered reader.
/// A reader built with [`AppcastReader::with_installed`] keeps at most one.
pub const MAX_ENCLOSURES_PER_ITEM: usize = 64;

/// Errors that abort reading an appcast.
///
/// All of these are fatal for the whole resolution: no partial result is
/// produced once one is returned.
#[derive(Debug, Error)]
pub enum FeedParseError {
    /// quick-xml rejected the document (unterminated or mismatched tags,
    /// malformed attributes, unknown entities, invalid UTF-8).
    #[error("XML parse error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// The stream ended while elements were still open.
    #[error("Feed ended with {open} unclosed element(s)")]
    UnexpectedEof { open: usize },

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// SEC-004: One item declares more enclosures than an unfiltered reader buffers.
    #[error("Item {position} has more than {limit} enclosures")]
    TooManyEnclosures { position: usize, limit: usize },
}

/// One `<enclosure>` declaration, with attribute values as written in the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    /// `sparkle:version`
    pub version: Option<String>,
    /// `sparkle:deltaFrom`; present only on delta packages.
    pub delta_from: Option<String>,
    /// `url`
    pub url: Option<String>,
    /// `sparkle:dsaSignature`, opaque to this crate.
    pub dsa_signature: Option<String>,
}

/// One `<item>` of the appcast, produced once its closing tag is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppcastItem {
    /// Zero-based index of the item in document order.
    pub position: usize,
    /// Enclosures in document order. When the reader filters for an
    /// installed version this holds at most the first eligible enclosure.
    pub enclosures: Vec<Enclosure>,
    /// Trimmed text of the first non-empty `sparkle:releaseNotesLink`.
    pub release_notes_link: Option<String>,
}

impl AppcastItem {
    fn new(position: usize) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Item,
    Enclosure,
    ReleaseNotesLink,
    Other,
}

impl Tag {
    fn of(name: &[u8]) -> Self {
        match name {
            ITEM_NODE => Self::Item,
            ENCLOSURE_NODE => Self::Enclosure,
            RELEASE_NOTES_LINK_NODE => Self::ReleaseNotesLink,
            _ => Self::Other,
        }
    }
}

/// Forward-only reader that yields appcast items one at a time.
///
/// Only the item being read is held in memory, so feeds of any length can be
/// walked. Every element, attribute and text node is decoded, including the
/// ones that are otherwise ignored, so a badly encoded document is rejected
/// as a whole. The iterator is fused after the first error.
///
/// # Example
///
/// ```
/// use appcast::AppcastReader;
///
/// let feed = r#"<rss><channel>
///     <item><enclosure sparkle:version="2.0.0" url="https://x/y.pkg"/></item>
/// </channel></rss>"#;
///
/// let items: Vec<_> = AppcastReader::new(feed.as_bytes())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(items.len(), 1);
/// assert_eq!(items[0].enclosures[0].url.as_deref(), Some("https://x/y.pkg"));
/// ```
pub struct AppcastReader<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    installed: Option<Version>,
    current: Option<AppcastItem>,
    release_notes: Option<String>,
    next_position: usize,
    depth: usize,
    done: bool,
}

impl<R: BufRead> AppcastReader<R> {
    /// Reader that keeps every enclosure of an item, up to
    /// [`MAX_ENCLOSURES_PER_ITEM`].
    pub fn new(source: R) -> Self {
        // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; custom
        // entities surface as an unescape error instead of being resolved.
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        Self {
            reader,
            buf: Vec::new(),
            installed: None,
            current: None,
            release_notes: None,
            next_position: 0,
            depth: 0,
            done: false,
        }
    }

    /// Reader that keeps only the first enclosure eligible for `installed`
    /// and drops every other enclosure as soon as it is read.
    pub fn with_installed(source: R, installed: Version) -> Self {
        Self {
            installed: Some(installed),
            ..Self::new(source)
        }
    }

    fn start_item(&mut self) {
        if let Some(partial) = self.current.take() {
            tracing::warn!(
                position = partial.position,
                "Nested <item> found, discarding partially read item"
            );
        }
        self.current = Some(AppcastItem::new(self.next_position));
        self.release_notes = None;
        self.next_position += 1;
    }

    fn push_enclosure(&mut self, enclosure: Enclosure) -> Result<(), FeedParseError> {
        let Some(item) = self.current.as_mut() else {
            return Ok(());
        };

        match &self.installed {
            Some(installed) => {
                if item.enclosures.is_empty() && enclosure.is_eligible_for(installed) {
                    item.enclosures.push(enclosure);
                }
            }
            None => {
                // SEC-004: Bound per-item memory
                if item.enclosures.len() >= MAX_ENCLOSURES_PER_ITEM {
                    return Err(FeedParseError::TooManyEnclosures {
                        position: item.position,
                        limit: MAX_ENCLOSURES_PER_ITEM,
                    });
                }
                item.enclosures.push(enclosure);
            }
        }
        Ok(())
    }

    fn read_next_item(&mut self) -> Result<Option<AppcastItem>, FeedParseError> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(xml_error(&self.reader, e)),
            };

            match event {
                Event::Start(e) => {
                    self.depth += 1;
                    // SEC-003: Reject excessively nested documents
                    if self.depth > MAX_FEED_DEPTH {
                        return Err(FeedParseError::MaxDepthExceeded(MAX_FEED_DEPTH));
                    }

                    let tag = Tag::of(e.name().as_ref());
                    match (tag, read_element(&e, &self.reader, tag)?) {
                        (_, Some(enclosure)) => self.push_enclosure(enclosure)?,
                        (Tag::Item, _) => self.start_item(),
                        (Tag::ReleaseNotesLink, _) => {
                            if self.current.is_some() {
                                self.release_notes = Some(String::new());
                            }
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    let tag = Tag::of(e.name().as_ref());
                    match (tag, read_element(&e, &self.reader, tag)?) {
                        (_, Some(enclosure)) => self.push_enclosure(enclosure)?,
                        (Tag::Item, _) => {
                            let position = self.next_position;
                            self.next_position += 1;
                            return Ok(Some(AppcastItem::new(position)));
                        }
                        _ => {}
                    }
                }
                Event::End(e) => {
                    self.depth = self.depth.saturating_sub(1);

                    match Tag::of(e.name().as_ref()) {
                        Tag::Item => {
                            self.release_notes = None;
                            if let Some(item) = self.current.take() {
                                return Ok(Some(item));
                            }
                        }
                        Tag::ReleaseNotesLink => {
                            if let (Some(text), Some(item)) =
                                (self.release_notes.take(), self.current.as_mut())
                            {
                                let link = text.trim();
                                if item.release_notes_link.is_none() && !link.is_empty() {
                                    item.release_notes_link = Some(link.to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    // Decoded even when unused: bad encoding or a bare '&' anywhere is fatal
                    let unescaped = e.unescape().map_err(|err| xml_error(&self.reader, err))?;
                    if let Some(text) = self.release_notes.as_mut() {
                        text.push_str(&unescaped);
                    }
                }
                Event::CData(e) => {
                    let raw = std::str::from_utf8(&e).map_err(|err| xml_error(&self.reader, err))?;
                    if let Some(text) = self.release_notes.as_mut() {
                        text.push_str(raw);
                    }
                }
                Event::Comment(e) => {
                    std::str::from_utf8(&e).map_err(|err| xml_error(&self.reader, err))?;
                }
                Event::Eof => {
                    if self.depth > 0 {
                        return Err(FeedParseError::UnexpectedEof { open: self.depth });
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for AppcastReader<R> {
    type Item = Result<AppcastItem, FeedParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_next_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for AppcastReader<R> {}

fn xml_error<R>(reader: &Reader<R>, err: impl std::fmt::Display) -> FeedParseError {
    FeedParseError::Xml {
        position: reader.buffer_position() as u64,
        message: err.to_string(),
    }
}

/// Decodes the element name and every attribute, returning the enclosure
/// fields when `tag` is an enclosure.
fn read_element<R>(
    start: &BytesStart<'_>,
    reader: &Reader<R>,
    tag: Tag,
) -> Result<Option<Enclosure>, FeedParseError> {
    let decoder = reader.decoder();
    decoder
        .decode(start.name().as_ref())
        .map_err(|e| xml_error(reader, e))?;

    let mut enclosure = Enclosure::default();
    for attr_result in start.attributes() {
        let attr = attr_result.map_err(|e| xml_error(reader, e))?;
        decoder
            .decode(attr.key.as_ref())
            .map_err(|e| xml_error(reader, e))?;
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| xml_error(reader, e))?;

        if tag != Tag::Enclosure {
            continue;
        }
        let slot = match attr.key.as_ref() {
            VERSION_ATTRIBUTE => &mut enclosure.version,
            DELTA_FROM_ATTRIBUTE => &mut enclosure.delta_from,
            URL_ATTRIBUTE => &mut enclosure.url,
            DSA_SIGNATURE_ATTRIBUTE => &mut enclosure.dsa_signature,
            _ => continue,
        };
        *slot = Some(value.trim().to_string());
    }

    Ok((tag == Tag::Enclosure).then_some(enclosure))
}
