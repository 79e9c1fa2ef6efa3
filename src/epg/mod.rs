//! EPG document handling: XMLTV parsing and the channel catalog

pub mod catalog;
pub mod xmltv;

pub use catalog::ChannelCatalog;
pub use xmltv::XmltvDocument;
