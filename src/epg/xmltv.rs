//! Quick-XML based XMLTV reader and writer
//!
//! Streaming parser that extracts only what the reconciliation needs:
//! channel ids, display names and the `channel` reference of each programme.
//! The verbatim XML of every channel and programme element is captured so
//! the pruned output copies entries byte-for-byte instead of re-serializing
//! them.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::errors::{AppError, AppResult, EpgError};
use crate::models::{EpgChannel, Programme};
use crate::utils::DecompressionService;

/// One parsed XMLTV document
#[derive(Debug, Clone)]
pub struct XmltvDocument {
    pub path: PathBuf,
    pub channels: Vec<EpgChannel>,
    pub programmes: Vec<Programme>,
}

/// Parse XMLTV content using the streaming quick-xml parser.
///
/// Only `channel` and `programme` elements directly under the root are
/// considered, matching the XMLTV document structure. `path` is used for
/// error reporting only.
pub fn parse_xmltv(content: &str, path: &Path) -> AppResult<XmltvDocument> {
    let mut reader = Reader::from_str(content);

    let mut channels: Vec<EpgChannel> = Vec::new();
    let mut programmes: Vec<Programme> = Vec::new();

    let mut depth = 0usize;
    // (id, display names, byte offset of the element start)
    let mut current_channel: Option<(String, Vec<String>, usize)> = None;
    // (channel ref, byte offset of the element start)
    let mut current_programme: Option<(String, usize)> = None;
    let mut in_display_name = false;
    let mut text_buf = String::new();

    loop {
        let event_start = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e, path)?;
                match name.as_str() {
                    "channel" if depth == 1 => {
                        let attrs = parse_attributes(e);
                        let id = attrs
                            .iter()
                            .find(|(k, _)| k == "id")
                            .map(|(_, v)| v.trim().to_string())
                            .unwrap_or_default();
                        current_channel = Some((id, Vec::new(), event_start));
                    }
                    "programme" if depth == 1 => {
                        let attrs = parse_attributes(e);
                        let channel = attrs
                            .iter()
                            .find(|(k, _)| k == "channel")
                            .map(|(_, v)| v.trim().to_string())
                            .unwrap_or_default();
                        current_programme = Some((channel, event_start));
                    }
                    "display-name" if current_channel.is_some() => {
                        in_display_name = true;
                        text_buf.clear();
                    }
                    _ => {}
                }
                depth += 1;
            }

            Ok(Event::End(ref e)) => {
                depth = depth.saturating_sub(1);
                let name = local_name_end(e.name().as_ref(), path)?;
                match name.as_str() {
                    "display-name" if in_display_name => {
                        in_display_name = false;
                        let text = text_buf.trim();
                        // resolve any escapes that arrived inside the text
                        // event itself; already-literal text passes through
                        let text = quick_xml::escape::unescape(text)
                            .map(|t| t.into_owned())
                            .unwrap_or_else(|_| text.to_string());
                        if !text.is_empty() {
                            if let Some((_, names, _)) = current_channel.as_mut() {
                                names.push(text);
                            }
                        }
                    }
                    "channel" if depth == 1 => {
                        if let Some((id, names, start)) = current_channel.take() {
                            let end = reader.buffer_position() as usize;
                            if id.is_empty() {
                                debug!("Skipping channel without id in {}", path.display());
                            } else {
                                channels.push(EpgChannel {
                                    id,
                                    display_names: names,
                                    raw_xml: content[start..end].to_string(),
                                });
                            }
                        }
                    }
                    "programme" if depth == 1 => {
                        if let Some((channel, start)) = current_programme.take() {
                            let end = reader.buffer_position() as usize;
                            programmes.push(Programme {
                                channel,
                                raw_xml: content[start..end].to_string(),
                            });
                        }
                    }
                    _ => {}
                }
            }

            Ok(Event::Empty(ref e)) => {
                let name = local_name(e, path)?;
                if depth == 1 {
                    let end = reader.buffer_position() as usize;
                    let attrs = parse_attributes(e);
                    match name.as_str() {
                        "channel" => {
                            let id = attrs
                                .iter()
                                .find(|(k, _)| k == "id")
                                .map(|(_, v)| v.trim().to_string())
                                .unwrap_or_default();
                            if !id.is_empty() {
                                channels.push(EpgChannel {
                                    id,
                                    display_names: Vec::new(),
                                    raw_xml: content[event_start..end].to_string(),
                                });
                            }
                        }
                        "programme" => {
                            let channel = attrs
                                .iter()
                                .find(|(k, _)| k == "channel")
                                .map(|(_, v)| v.trim().to_string())
                                .unwrap_or_default();
                            programmes.push(Programme {
                                channel,
                                raw_xml: content[event_start..end].to_string(),
                            });
                        }
                        _ => {}
                    }
                }
            }

            Ok(Event::Text(e)) => {
                if in_display_name {
                    let text = std::str::from_utf8(&e).map_err(|err| EpgError::Malformed {
                        path: path.to_path_buf(),
                        message: format!("invalid UTF-8 in text: {err}"),
                    })?;
                    text_buf.push_str(text);
                }
            }

            Ok(Event::CData(e)) => {
                if in_display_name {
                    let text = std::str::from_utf8(&e).map_err(|err| EpgError::Malformed {
                        path: path.to_path_buf(),
                        message: format!("invalid UTF-8 in CDATA: {err}"),
                    })?;
                    text_buf.push_str(text);
                }
            }

            Ok(Event::GeneralRef(e)) => {
                // entity references inside text arrive as their own events
                if in_display_name {
                    if let Ok(name) = std::str::from_utf8(&e) {
                        if let Some(ch) = resolve_entity(name) {
                            text_buf.push(ch);
                        }
                    }
                }
            }

            Ok(Event::Eof) => {
                // quick-xml does not flag dangling open tags on its own
                if depth != 0 || current_channel.is_some() || current_programme.is_some() {
                    return Err(EpgError::Malformed {
                        path: path.to_path_buf(),
                        message: "unexpected end of document".to_string(),
                    }
                    .into());
                }
                break;
            }

            Err(e) => {
                return Err(EpgError::Malformed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into());
            }

            _ => {} // declarations, comments, processing instructions
        }
    }

    debug!(
        "Parsed {}: {} channels, {} programmes",
        path.display(),
        channels.len(),
        programmes.len()
    );

    Ok(XmltvDocument {
        path: path.to_path_buf(),
        channels,
        programmes,
    })
}

/// Read, decompress and parse an XMLTV file (gzip-transparent).
pub fn load_xmltv(path: &Path) -> AppResult<XmltvDocument> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::missing_input(path, format!("cannot read EPG document: {e}")))?;
    let decompressed =
        DecompressionService::decompress(bytes.into()).map_err(|e| EpgError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    let content = String::from_utf8(decompressed).map_err(|e| EpgError::Encoding {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_xmltv(&content, path)
}

/// Serialize kept channel and programme blocks into an XMLTV document.
///
/// Blocks are verbatim element XML captured at parse time, written in the
/// order given.
pub fn render_document(channel_xml: &[&str], programme_xml: &[&str]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tv generator-info-name=\"epg-reconcile\">\n",
    );
    for block in channel_xml.iter().chain(programme_xml.iter()) {
        out.push_str("  ");
        out.push_str(block.trim());
        out.push('\n');
    }
    out.push_str("</tv>\n");
    out
}

/// Write an XMLTV document to disk, gzipping when the path ends in `.gz`.
pub fn save_xmltv(path: &Path, content: &str) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.extension().is_some_and(|ext| ext == "gz") {
        let compressed =
            DecompressionService::compress_gzip(content.as_bytes()).map_err(|e| {
                EpgError::Malformed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
        std::fs::write(path, compressed)?;
    } else {
        std::fs::write(path, content)?;
    }
    Ok(())
}

fn local_name(element: &BytesStart, path: &Path) -> AppResult<String> {
    local_name_end(element.name().as_ref(), path)
}

fn local_name_end(name: &[u8], path: &Path) -> AppResult<String> {
    std::str::from_utf8(name)
        .map(str::to_string)
        .map_err(|e| {
            EpgError::Malformed {
                path: path.to_path_buf(),
                message: format!("invalid UTF-8 in element name: {e}"),
            }
            .into()
        })
}

/// Parse XML attributes into key/value pairs
fn parse_attributes(element: &BytesStart) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for attr in element.attributes().flatten() {
        if let (Ok(key), Ok(value)) = (
            std::str::from_utf8(attr.key.as_ref()),
            std::str::from_utf8(&attr.value),
        ) {
            attrs.push((key.to_string(), value.to_string()));
        }
    }
    attrs
}

/// Resolve predefined and character entity references in text nodes.
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}
