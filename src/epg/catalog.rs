//! EPG channel catalog
//!
//! Builds the lookup indices the identity resolver matches against: channel
//! id, normalized display name and id country-suffix. De-duplication is
//! first-seen-wins everywhere so lookups stay stable across runs; switching
//! to last-seen-wins would change matching results.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::epg::xmltv::{self, XmltvDocument};
use crate::errors::{AppError, AppResult};
use crate::normalize::{compact_id, normalize};

/// Two-lowercase-letter country suffix at the end of a channel id.
static RE_ID_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([a-z]{2})$").expect("invalid suffix regex"));

/// In-memory channel indices over one or more XMLTV documents
#[derive(Debug, Default)]
pub struct ChannelCatalog {
    /// id -> display names (defaulted to the id itself when none supplied)
    channels: HashMap<String, Vec<String>>,
    /// ids in first-seen order, for deterministic candidate iteration
    order: Vec<String>,
    /// normalized display name -> ids carrying it (first-seen order)
    name_index: HashMap<String, Vec<String>>,
    /// country suffix -> ids ending in `.<suffix>` (first-seen order)
    suffix_index: HashMap<String, Vec<String>>,
    /// id stripped to alphanumerics -> first id registered under that form
    compact_index: HashMap<String, String>,
}

impl ChannelCatalog {
    /// Build the catalog from parsed documents, in order.
    pub fn build(documents: &[XmltvDocument]) -> Self {
        let mut catalog = Self::default();

        for document in documents {
            for channel in &document.channels {
                if catalog.channels.contains_key(&channel.id) {
                    debug!(
                        "Skipping duplicate channel id '{}' from {}",
                        channel.id,
                        document.path.display()
                    );
                    continue;
                }

                let display_names = if channel.display_names.is_empty() {
                    vec![channel.id.clone()]
                } else {
                    // set semantics, insertion order preserved
                    let mut names: Vec<String> = Vec::new();
                    for name in &channel.display_names {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                    names
                };

                for name in &display_names {
                    let key = normalize(name);
                    if key.is_empty() {
                        continue;
                    }
                    let ids = catalog.name_index.entry(key).or_default();
                    if !ids.contains(&channel.id) {
                        ids.push(channel.id.clone());
                    }
                }

                if let Some(captures) = RE_ID_SUFFIX.captures(&channel.id) {
                    catalog
                        .suffix_index
                        .entry(captures[1].to_string())
                        .or_default()
                        .push(channel.id.clone());
                }

                catalog
                    .compact_index
                    .entry(compact_id(&channel.id))
                    .or_insert_with(|| channel.id.clone());

                catalog.order.push(channel.id.clone());
                catalog.channels.insert(channel.id.clone(), display_names);
            }
        }

        info!(
            "Catalog built: {} channels from {} documents",
            catalog.order.len(),
            documents.len()
        );
        catalog
    }

    /// Load and parse a set of XMLTV files, then build the catalog.
    ///
    /// A malformed document is skipped with a warning; a document that
    /// cannot be read at all, or an input set yielding no usable document,
    /// aborts the run. Returns the parsed documents alongside the catalog
    /// so the output assembler can make its second pass over them.
    pub fn load(paths: &[impl AsRef<Path>]) -> AppResult<(Self, Vec<XmltvDocument>)> {
        let mut documents = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match xmltv::load_xmltv(path) {
                Ok(document) => documents.push(document),
                Err(AppError::Epg(e)) => {
                    warn!("Skipping malformed XMLTV document: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        if documents.is_empty() {
            return Err(AppError::empty_result(
                "no usable XMLTV documents; refusing to build an empty catalog",
            ));
        }

        Ok((Self::build(&documents), documents))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    /// Display names registered for an id.
    pub fn display_names(&self, id: &str) -> Option<&[String]> {
        self.channels.get(id).map(Vec::as_slice)
    }

    /// All ids, in first-seen order.
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Ids whose normalized display name equals `key` (0, 1 or more).
    pub fn ids_by_normalized_name(&self, key: &str) -> &[String] {
        self.name_index.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids ending in `.<suffix>`, in first-seen order.
    pub fn ids_by_suffix(&self, suffix: &str) -> &[String] {
        self.suffix_index
            .get(suffix)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First id whose alphanumeric-only form equals `compact`.
    pub fn id_by_compact(&self, compact: &str) -> Option<&str> {
        self.compact_index.get(compact).map(String::as_str)
    }
}
