//! EPUB container access and package/navigation parsing.

mod archive;
mod parser;

pub use archive::{Container, EpubArchive};
pub use parser::{
    ManifestItem, OpfData, TocEntry, flatten_toc, parse_container_xml, parse_nav, parse_ncx,
    parse_opf,
};
