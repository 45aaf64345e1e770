//! Builder for constructing CryXmlB documents.
//!
//! [`CryXmlBuilder`] flattens an element tree into the four CryXmlB tables.
//! [`RawTables`] is the flattened form and can also be filled by hand, which
//! is how malformed documents (cyclic child tables, dangling ranges) are
//! produced for testing the decoder.

use std::collections::HashMap;

use zerocopy::IntoBytes;

use crate::{CryXmlAttribute, CryXmlHeader, CryXmlNode, Error, Result};

/// A node being built, before final serialization.
#[derive(Debug, Clone)]
pub struct BuilderNode {
    /// Tag name of the element.
    pub tag: String,
    /// Text content (usually empty for CryXmlB).
    pub content: String,
    /// Attributes as key-value pairs.
    pub attributes: Vec<(String, String)>,
    /// Child nodes.
    pub children: Vec<BuilderNode>,
}

impl BuilderNode {
    /// Create a new builder node with the given tag name.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            content: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Set the text content of this node.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Add an attribute to this node.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Add a child node.
    pub fn child(mut self, child: BuilderNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add multiple children.
    pub fn children(mut self, children: impl IntoIterator<Item = BuilderNode>) -> Self {
        self.children.extend(children);
        self
    }
}

/// The four CryXmlB tables, ready to be laid out.
///
/// Nothing here is validated: whatever the tables say is what gets written.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub nodes: Vec<CryXmlNode>,
    pub attributes: Vec<CryXmlAttribute>,
    pub child_indices: Vec<i32>,
    pub strings: Vec<u8>,
}

impl RawTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a NUL-terminated string and return its offset. No deduplication.
    pub fn push_string(&mut self, s: &str) -> u32 {
        let offset = self.strings.len() as u32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        offset
    }

    /// Lay the tables out as a CryXmlB buffer.
    ///
    /// Layout: magic, header, nodes, child indices, attributes, strings.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let node_table_size = self.nodes.len() * CryXmlNode::SIZE;
        let child_table_size = self.child_indices.len() * 4;
        let attribute_table_size = self.attributes.len() * CryXmlAttribute::SIZE;

        let node_table_position = CryXmlHeader::MAGIC_LEN + CryXmlHeader::SIZE;
        let child_table_position = node_table_position + node_table_size;
        let attribute_table_position = child_table_position + child_table_size;
        let string_data_position = attribute_table_position + attribute_table_size;
        let total_size = string_data_position + self.strings.len();

        let header = CryXmlHeader {
            xml_size: to_u32("bytes", total_size - CryXmlHeader::MAGIC_LEN)?,
            node_table_position: to_u32("bytes", node_table_position)?,
            node_count: to_u32("nodes", self.nodes.len())?,
            attribute_table_position: to_u32("bytes", attribute_table_position)?,
            attribute_count: to_u32("attributes", self.attributes.len())?,
            child_table_position: to_u32("bytes", child_table_position)?,
            child_count: to_u32("child indices", self.child_indices.len())?,
            string_data_position: to_u32("bytes", string_data_position)?,
            string_data_size: to_u32("string bytes", self.strings.len())?,
        };

        let mut output = Vec::with_capacity(total_size);
        output.extend_from_slice(CryXmlHeader::MAGIC);
        output.extend_from_slice(header.as_bytes());
        output.extend_from_slice(self.nodes.as_bytes());
        output.extend_from_slice(self.child_indices.as_bytes());
        output.extend_from_slice(self.attributes.as_bytes());
        output.extend_from_slice(&self.strings);
        Ok(output)
    }
}

/// Builder for constructing CryXmlB documents.
///
/// # Example
///
/// ```
/// use starbind_cryxml::builder::{BuilderNode, CryXmlBuilder};
/// use starbind_cryxml::{CryXml, XmlOptions};
///
/// let root = BuilderNode::new("ActionMaps")
///     .child(BuilderNode::new("actionmap").attr("name", "spaceship_general"));
///
/// let bytes = CryXmlBuilder::new(root).build()?;
/// let xml = CryXml::parse(&bytes)?.to_xml_string_with(&XmlOptions::compact())?;
/// assert_eq!(xml, r#"<ActionMaps><actionmap name="spaceship_general"/></ActionMaps>"#);
/// # Ok::<(), starbind_cryxml::Error>(())
/// ```
#[derive(Debug)]
pub struct CryXmlBuilder {
    root: BuilderNode,
}

impl CryXmlBuilder {
    /// Create a new builder with the given root node.
    pub fn new(root: BuilderNode) -> Self {
        Self { root }
    }

    /// Build the CryXmlB binary representation.
    pub fn build(&self) -> Result<Vec<u8>> {
        self.to_tables()?.to_bytes()
    }

    /// Flatten the tree into tables.
    ///
    /// Nodes are numbered in document order with the root at 0, and each
    /// node's children occupy a contiguous run of the child index table.
    pub fn to_tables(&self) -> Result<RawTables> {
        let mut strings = StringTable::default();
        let mut tables = RawTables::new();
        // (node, parent index, child table slot that should point at it)
        let mut pending: Vec<(&BuilderNode, i32, Option<usize>)> = vec![(&self.root, -1, None)];

        while let Some((node, parent_index, slot)) = pending.pop() {
            let index = to_i32("nodes", tables.nodes.len())?;
            if let Some(slot) = slot {
                tables.child_indices[slot] = index;
            }

            let tag_string_offset = strings.intern(&node.tag)?;
            let content_string_offset = strings.intern(&node.content)?;

            let first_attribute_index = to_i32("attributes", tables.attributes.len())?;
            for (key, value) in &node.attributes {
                tables.attributes.push(CryXmlAttribute {
                    key_string_offset: strings.intern(key)?,
                    value_string_offset: strings.intern(value)?,
                });
            }

            let first_child_index = to_i32("child indices", tables.child_indices.len())?;
            tables.nodes.push(CryXmlNode {
                tag_string_offset,
                content_string_offset,
                attribute_count: to_u16("attributes on one node", node.attributes.len())?,
                child_count: to_u16("children on one node", node.children.len())?,
                parent_index,
                first_attribute_index,
                first_child_index,
                _padding: 0,
            });

            let start = tables.child_indices.len();
            tables.child_indices.resize(start + node.children.len(), 0);
            for (i, child) in node.children.iter().enumerate().rev() {
                pending.push((child, index, Some(start + i)));
            }
        }

        tables.strings = strings.into_bytes();
        Ok(tables)
    }
}

/// Deduplicating string table.
#[derive(Debug, Default)]
struct StringTable {
    bytes: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    /// Offset of `s`, adding it if not already present.
    fn intern(&mut self, s: &str) -> Result<u32> {
        if let Some(&offset) = self.offsets.get(s) {
            return Ok(offset);
        }
        let offset = to_u32("string bytes", self.bytes.len())?;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        self.offsets.insert(s.to_string(), offset);
        Ok(offset)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn to_u32(what: &'static str, count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| Error::TooMany { what, count })
}

fn to_i32(what: &'static str, count: usize) -> Result<i32> {
    i32::try_from(count).map_err(|_| Error::TooMany { what, count })
}

fn to_u16(what: &'static str, count: usize) -> Result<u16> {
    u16::try_from(count).map_err(|_| Error::TooMany { what, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CryXml;

    #[test]
    fn test_builder_basic() {
        let root = BuilderNode::new("Root").attr("version", "1.0");

        let bytes = CryXmlBuilder::new(root).build().unwrap();
        assert_eq!(&bytes[..8], b"CryXmlB\0");

        let parsed = CryXml::parse(&bytes).unwrap();
        let root = parsed.root().unwrap();
        assert_eq!(parsed.tag(root).unwrap(), "Root");
    }

    #[test]
    fn test_layout_positions() {
        let root = BuilderNode::new("a")
            .attr("k", "v")
            .child(BuilderNode::new("b"));
        let bytes = CryXmlBuilder::new(root).build().unwrap();
        let parsed = CryXml::parse(&bytes).unwrap();
        let header = *parsed.header();

        let node_table_position = header.node_table_position;
        let child_table_position = header.child_table_position;
        let attribute_table_position = header.attribute_table_position;
        let string_data_position = header.string_data_position;
        let string_data_size = header.string_data_size;
        let xml_size = header.xml_size;

        assert_eq!(node_table_position, 44);
        assert_eq!(child_table_position, 44 + 2 * 28);
        assert_eq!(attribute_table_position, 44 + 2 * 28 + 4);
        assert_eq!(string_data_position, 44 + 2 * 28 + 4 + 8);
        // "a", "", "k", "v", "b" each with a terminator.
        assert_eq!(string_data_size, 2 + 1 + 2 + 2 + 2);
        assert_eq!(xml_size as usize, bytes.len() - 8);
    }

    #[test]
    fn test_strings_are_deduplicated() {
        let root = BuilderNode::new("Setting")
            .attr("key", "Setting")
            .child(BuilderNode::new("Setting").attr("key", "other"));
        let tables = CryXmlBuilder::new(root).to_tables().unwrap();

        assert_eq!(tables.strings, b"Setting\0\0key\0other\0");
        let first = tables.nodes[0].tag_string_offset;
        let second = tables.nodes[1].tag_string_offset;
        assert_eq!(first, second);
    }

    #[test]
    fn test_nodes_numbered_in_document_order() {
        let root = BuilderNode::new("Config")
            .child(
                BuilderNode::new("Group")
                    .child(BuilderNode::new("Leaf").attr("n", "1"))
                    .child(BuilderNode::new("Leaf").attr("n", "2")),
            )
            .child(BuilderNode::new("Tail"));

        let bytes = CryXmlBuilder::new(root).build().unwrap();
        let parsed = CryXml::parse(&bytes).unwrap();

        let tags: Vec<&str> = (0..parsed.len())
            .map(|i| parsed.tag(parsed.node(i).unwrap()).unwrap())
            .collect();
        assert_eq!(tags, ["Config", "Group", "Leaf", "Leaf", "Tail"]);

        assert_eq!(parsed.children(0).unwrap(), vec![1, 4]);
        assert_eq!(parsed.children(1).unwrap(), vec![2, 3]);
        assert!(parsed.children(4).unwrap().is_empty());

        let parents: Vec<i32> = (0..parsed.len())
            .map(|i| parsed.node(i).unwrap().parent_index)
            .collect();
        assert_eq!(parents, [-1, 0, 1, 1, 0]);

        let attrs = parsed.node_attributes(3).unwrap();
        assert_eq!(parsed.get_string(attrs[0].value_string_offset).unwrap(), "2");
    }

    #[test]
    fn test_too_many_attributes_on_one_node() {
        let mut root = BuilderNode::new("wide");
        root.attributes = (0..=u16::MAX as usize)
            .map(|i| (format!("a{}", i), String::new()))
            .collect();

        assert!(matches!(
            CryXmlBuilder::new(root).build(),
            Err(Error::TooMany { count: 65536, .. })
        ));
    }
}
