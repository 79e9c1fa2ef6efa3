//! Favourites-driven M3U playlist pruning and XMLTV EPG reconciliation
//!
//! Reconciles three loosely related channel catalogs: a user-curated
//! favourites list, one or more master channel-list playlists, and one or
//! more XMLTV guides. The output is a pruned playlist restricted to
//! favourite channels with identifiers corrected to match the guide, plus a
//! correspondingly pruned EPG document.

pub mod aliases;
pub mod config;
pub mod epg;
pub mod errors;
pub mod favourites;
pub mod fetch;
pub mod grabber;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod output;
pub mod playlist;
pub mod resolver;
pub mod utils;
