//! XMLTV document lexer.
//!
//! Extracts `<channel>` and `<programme>` records from one site artifact.
//! Channels are captured with raw-text regexes so the original fragment can
//! be re-emitted byte-for-byte; programmes are walked with a streaming
//! quick-xml reader. The input is upstream-generated XMLTV, not arbitrary
//! XML: unknown sub-elements are ignored, and a structural surprise drops
//! only the malformed fragment with a warning while the scan carries on.

use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use tracing::{debug, warn};

use crate::models::{Channel, Credits, EpisodeNum, GuideDocument, LangText, Programme};
use crate::xmltv::time::parse_timestamp;

static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<channel\b[^>]*>.*?</channel>").unwrap());
static ID_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\bid="([^"]*)""#).unwrap());
static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<display-name[^>]*>(.*?)</display-name>").unwrap());
static ICON_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<icon\b[^>]*\bsrc="([^"]*)""#).unwrap());
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<url[^>]*>(.*?)</url>").unwrap());

/// Parse one artifact into channels and programmes, stamping `source_site`
/// on every record.
pub fn parse_document(content: &str, source_site: &str) -> GuideDocument {
    let mut doc = GuideDocument {
        channels: parse_channels(content, source_site),
        ..GuideDocument::default()
    };
    parse_programmes(content, source_site, &mut doc);
    if doc.dropped > 0 {
        debug!(
            "dropped {} programme(s) with unusable times from {}",
            doc.dropped, source_site
        );
    }
    doc
}

fn parse_channels(content: &str, source_site: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    for m in CHANNEL_RE.find_iter(content) {
        let raw = m.as_str();
        let open_tag_end = raw.find('>').map(|i| i + 1).unwrap_or(raw.len());
        let Some(id) = ID_ATTR_RE
            .captures(&raw[..open_tag_end])
            .map(|c| c[1].to_string())
        else {
            warn!("channel element without id attribute in {source_site}, skipping");
            continue;
        };
        channels.push(Channel {
            id,
            display_name: DISPLAY_NAME_RE
                .captures(raw)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_default(),
            icon: ICON_SRC_RE.captures(raw).map(|c| c[1].to_string()),
            url: URL_RE.captures(raw).map(|c| c[1].trim().to_string()),
            source_site: source_site.to_string(),
            raw_xml: raw.to_string(),
        });
    }
    channels
}

/// Accumulates one programme while its element is open.
#[derive(Default)]
struct ProgrammeBuilder {
    start: String,
    stop: String,
    channel: String,
    titles: Vec<LangText>,
    sub_titles: Vec<LangText>,
    descs: Vec<LangText>,
    credits: Credits,
    categories: Vec<String>,
    episode_nums: Vec<EpisodeNum>,
    icons: Vec<String>,
    ratings: Vec<String>,
}

impl ProgrammeBuilder {
    fn from_attrs(attrs: &HashMap<String, String>) -> Self {
        Self {
            start: attrs.get("start").cloned().unwrap_or_default(),
            stop: attrs.get("stop").cloned().unwrap_or_default(),
            channel: attrs.get("channel").cloned().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Resolve times and produce the record, or `None` when either timestamp
    /// is unusable or the interval is inverted.
    fn finish(self, source_site: &str) -> Option<Programme> {
        let start = parse_timestamp(&self.start).ok()?;
        let stop = parse_timestamp(&self.stop).ok()?;
        if start > stop {
            return None;
        }
        Some(Programme {
            channel: self.channel,
            start,
            stop,
            titles: self.titles,
            sub_titles: self.sub_titles,
            descs: self.descs,
            credits: self.credits,
            categories: self.categories.into_iter().collect(),
            episode_nums: self.episode_nums,
            icons: self.icons.into_iter().collect(),
            ratings: self.ratings.into_iter().collect(),
            source_site: source_site.to_string(),
        })
    }
}

fn parse_programmes(content: &str, source_site: &str, doc: &mut GuideDocument) {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut current: Option<ProgrammeBuilder> = None;
    let mut element_stack: Vec<String> = Vec::new();
    let mut current_text = String::new();
    // `lang`/`system` attribute of the innermost open text-bearing element
    let mut pending_lang: Option<String> = None;
    let mut pending_system: Option<String> = None;
    let mut last_error_pos = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "programme" => {
                        current = Some(ProgrammeBuilder::from_attrs(&parse_attributes(e)));
                    }
                    "title" | "sub-title" | "desc" => {
                        pending_lang = parse_attributes(e).remove("lang");
                    }
                    "episode-num" => {
                        pending_system = parse_attributes(e).remove("system");
                    }
                    "icon" => {
                        if let Some(ref mut programme) = current {
                            if let Some(src) = parse_attributes(e).remove("src") {
                                programme.icons.push(src);
                            }
                        }
                    }
                    _ => {}
                }
                element_stack.push(name);
                current_text.clear();
            }

            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if let Some(ref mut programme) = current {
                    let text = current_text.trim().to_string();
                    match name.as_str() {
                        "title" if !text.is_empty() => {
                            programme.titles.push(LangText::new(pending_lang.take(), text));
                        }
                        "sub-title" if !text.is_empty() => {
                            programme
                                .sub_titles
                                .push(LangText::new(pending_lang.take(), text));
                        }
                        "desc" if !text.is_empty() => {
                            programme.descs.push(LangText::new(pending_lang.take(), text));
                        }
                        "category" if !text.is_empty() => {
                            programme.categories.push(text);
                        }
                        "episode-num" if !text.is_empty() => {
                            programme.episode_nums.push(EpisodeNum {
                                system: pending_system.take(),
                                text,
                            });
                        }
                        "value" if !text.is_empty() && in_element(&element_stack, "rating") => {
                            programme.ratings.push(text);
                        }
                        "director" | "actor" | "writer" | "producer" | "presenter"
                            if !text.is_empty() && in_element(&element_stack, "credits") =>
                        {
                            let list = match name.as_str() {
                                "director" => &mut programme.credits.directors,
                                "actor" => &mut programme.credits.actors,
                                "writer" => &mut programme.credits.writers,
                                "producer" => &mut programme.credits.producers,
                                _ => &mut programme.credits.presenters,
                            };
                            list.push(text);
                        }
                        "programme" => {
                            if let Some(builder) = current.take() {
                                match builder.finish(source_site) {
                                    Some(p) => doc.programmes.push(p),
                                    None => doc.dropped += 1,
                                }
                            }
                        }
                        _ => {}
                    }
                }
                element_stack.pop();
                current_text.clear();
            }

            Ok(Event::Empty(ref e)) => {
                if let Some(ref mut programme) = current {
                    if e.name().as_ref() == b"icon" {
                        if let Some(src) = parse_attributes(e).remove("src") {
                            programme.icons.push(src);
                        }
                    }
                }
            }

            Ok(Event::Text(e)) => match e.unescape() {
                Ok(text) => current_text.push_str(&text),
                Err(err) => debug!("unescapable text in {source_site}: {err}"),
            },

            Ok(Event::CData(e)) => {
                current_text.push_str(&String::from_utf8_lossy(&e));
            }

            Ok(Event::Eof) => break,

            Err(e) => {
                warn!("structural surprise in {source_site} XMLTV, skipping fragment: {e}");
                if current.take().is_some() {
                    doc.dropped += 1;
                }
                current_text.clear();
                // resync to the next event; give up only if the reader is
                // stuck at the same position
                let pos = reader.buffer_position();
                if last_error_pos == Some(pos) {
                    break;
                }
                last_error_pos = Some(pos);
            }

            _ => {}
        }
    }
}

fn in_element(stack: &[String], name: &str) -> bool {
    stack.iter().any(|n| n == name)
}

/// Parse XML attributes into a HashMap, resolving entities in values.
fn parse_attributes(element: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in element.attributes().flatten() {
        if let (Ok(key), Ok(value)) = (
            std::str::from_utf8(attr.key.as_ref()),
            attr.unescape_value(),
        ) {
            attrs.insert(key.to_string(), value.into_owned());
        }
    }
    attrs
}
