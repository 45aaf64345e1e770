//! CryXmlB binary XML decoder for Star Citizen files.
//!
//! Star Citizen ships many configuration files, the default keybinding
//! profile among them, in a binary XML format called CryXmlB: a fixed header
//! followed by four flat tables (nodes, attributes, child indices, strings).
//! This crate parses those tables and renders them back to textual XML.
//!
//! The tables come from an untrusted file, so every table extent is checked
//! on parse, every cross-reference is checked when followed, and the tree is
//! walked with an explicit, bounded stack instead of recursion.
//!
//! # Example
//!
//! ```no_run
//! use starbind_cryxml::CryXml;
//!
//! let data = std::fs::read("defaultProfile.xml")?;
//!
//! if CryXml::is_cryxml(&data) {
//!     let cryxml = CryXml::parse(&data)?;
//!     let xml_string = cryxml.to_xml_string()?;
//!     println!("{}", xml_string);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod attribute;
pub mod builder;
mod error;
mod header;
mod node;
mod parser;
mod writer;

pub use attribute::CryXmlAttribute;
pub use error::{Error, Result, Table};
pub use header::CryXmlHeader;
pub use node::CryXmlNode;
pub use parser::{CryXml, MAX_STRING_LEN};
pub use writer::XmlOptions;
