//! CryXmlB parser.

use std::ops::Range;

use log::debug;
use starbind_common::{BinaryReader, FromBytes};

use crate::{CryXmlAttribute, CryXmlHeader, CryXmlNode, Error, Result, Table};

/// Longest string read from the string table before giving up on finding
/// its terminator.
pub const MAX_STRING_LEN: usize = 64 * 1024;

/// Parsed CryXmlB document.
///
/// The four tables are kept flat, exactly as stored, and cross-references
/// are validated when they are followed rather than up front. Table extents
/// themselves are validated by [`CryXml::parse`].
#[derive(Debug)]
pub struct CryXml {
    header: CryXmlHeader,
    nodes: Vec<CryXmlNode>,
    child_indices: Vec<i32>,
    attributes: Vec<CryXmlAttribute>,
    string_data: Vec<u8>,
}

impl CryXml {
    /// Check if data is a CryXmlB file by checking the magic bytes.
    pub fn is_cryxml(data: &[u8]) -> bool {
        data.len() >= CryXmlHeader::MAGIC_LEN && &data[..CryXmlHeader::MAGIC_LEN] == CryXmlHeader::MAGIC
    }

    /// Parse a CryXmlB file from bytes.
    ///
    /// Fails if the magic is wrong, the header is cut short, or any table
    /// reaches past the end of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !Self::is_cryxml(data) {
            return Err(Error::InvalidMagic {
                actual: data[..CryXmlHeader::MAGIC_LEN.min(data.len())].to_vec(),
            });
        }

        let header: CryXmlHeader = BinaryReader::new_at(data, CryXmlHeader::MAGIC_LEN).read_struct()?;

        let nodes = read_table::<CryXmlNode>(
            data,
            Table::Nodes,
            header.node_table_position,
            header.node_count,
        )?;
        let child_indices = read_table::<i32>(
            data,
            Table::Children,
            header.child_table_position,
            header.child_count,
        )?;
        let attributes = read_table::<CryXmlAttribute>(
            data,
            Table::Attributes,
            header.attribute_table_position,
            header.attribute_count,
        )?;
        let strings = table_range(
            data.len(),
            Table::Strings,
            header.string_data_position,
            header.string_data_size as u64,
        )?;

        debug!(
            "CryXmlB: {} nodes, {} attributes, {} child indices, {} string bytes",
            nodes.len(),
            attributes.len(),
            child_indices.len(),
            strings.len()
        );

        Ok(Self {
            header,
            nodes,
            child_indices,
            attributes,
            string_data: data[strings].to_vec(),
        })
    }

    /// The file header.
    pub fn header(&self) -> &CryXmlHeader {
        &self.header
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a string from the string table by offset.
    ///
    /// Reads up to the next NUL. A string that reaches the end of the table
    /// unterminated is returned as is; one longer than [`MAX_STRING_LEN`] is
    /// an error.
    pub fn get_string(&self, offset: u32) -> Result<&str> {
        let start = offset as usize;
        if start >= self.string_data.len() {
            return Err(Error::StringOffsetOutOfBounds {
                offset,
                size: self.string_data.len(),
            });
        }

        let window_end = self.string_data.len().min(start.saturating_add(MAX_STRING_LEN + 1));
        let window = &self.string_data[start..window_end];
        let len = match starbind_common::memchr::memchr(0, window) {
            Some(len) => len,
            None if window.len() > MAX_STRING_LEN => {
                return Err(Error::StringTooLong {
                    offset,
                    max: MAX_STRING_LEN,
                })
            }
            None => window.len(),
        };

        Ok(std::str::from_utf8(&window[..len])?)
    }

    /// Get the root node.
    pub fn root(&self) -> Option<&CryXmlNode> {
        self.nodes.first()
    }

    /// Get a node by index.
    pub fn node(&self, index: usize) -> Option<&CryXmlNode> {
        self.nodes.get(index)
    }

    /// Tag name of a node.
    pub fn tag(&self, node: &CryXmlNode) -> Result<&str> {
        self.get_string(node.tag_string_offset)
    }

    /// Text content of a node, usually empty.
    pub fn content(&self, node: &CryXmlNode) -> Result<&str> {
        self.get_string(node.content_string_offset)
    }

    /// Attribute records of the node at `index`.
    pub fn node_attributes(&self, index: usize) -> Result<&[CryXmlAttribute]> {
        let node = self.node_at(index)?;
        let range = segment(
            index,
            Table::Attributes,
            node.first_attribute_index,
            node.attributes(),
            self.attributes.len(),
        )?;
        Ok(&self.attributes[range])
    }

    /// Raw child indices of the node at `index`, as stored.
    pub fn child_indices(&self, index: usize) -> Result<&[i32]> {
        let node = self.node_at(index)?;
        let range = segment(
            index,
            Table::Children,
            node.first_child_index,
            node.children(),
            self.child_indices.len(),
        )?;
        Ok(&self.child_indices[range])
    }

    /// Validated child node indices of the node at `index`.
    pub fn children(&self, index: usize) -> Result<Vec<usize>> {
        self.child_indices(index)?
            .iter()
            .map(|&raw| self.resolve_node(raw))
            .collect()
    }

    /// Turn a stored node reference into a valid index.
    pub fn resolve_node(&self, raw: i32) -> Result<usize> {
        usize::try_from(raw)
            .ok()
            .filter(|&index| index < self.nodes.len())
            .ok_or(Error::NodeIndexOutOfBounds {
                index: raw as i64,
                count: self.nodes.len(),
            })
    }

    pub(crate) fn node_at(&self, index: usize) -> Result<&CryXmlNode> {
        self.nodes.get(index).ok_or(Error::NodeIndexOutOfBounds {
            index: index as i64,
            count: self.nodes.len(),
        })
    }
}

/// Byte range of a table inside a buffer of `buffer_len` bytes.
fn table_range(buffer_len: usize, table: Table, position: u32, size: u64) -> Result<Range<usize>> {
    let start = position as u64;
    let end = start + size;
    if end > buffer_len as u64 {
        return Err(Error::TableOutOfBounds {
            table,
            position: start,
            size,
            buffer_len,
        });
    }
    Ok(start as usize..end as usize)
}

fn read_table<T: FromBytes>(data: &[u8], table: Table, position: u32, count: u32) -> Result<Vec<T>> {
    let size = count as u64 * std::mem::size_of::<T>() as u64;
    let range = table_range(data.len(), table, position, size)?;
    Ok(BinaryReader::new(&data[range]).read_array(count as usize)?)
}

/// Slice bounds for a node's run of attributes or children.
fn segment(node: usize, table: Table, first: i32, count: usize, size: usize) -> Result<Range<usize>> {
    if count == 0 {
        return Ok(0..0);
    }
    usize::try_from(first)
        .ok()
        .and_then(|start| Some(start..start.checked_add(count)?))
        .filter(|range| range.end <= size)
        .ok_or(Error::RangeOutOfBounds {
            node,
            table,
            first,
            count,
            size,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuilderNode, CryXmlBuilder, RawTables};

    fn sample() -> Vec<u8> {
        CryXmlBuilder::new(
            BuilderNode::new("root")
                .attr("attr", "1")
                .child(BuilderNode::new("child")),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn test_is_cryxml() {
        assert!(CryXml::is_cryxml(b"CryXmlB\0extra data"));
        assert!(!CryXml::is_cryxml(b"NotCryXml"));
        assert!(!CryXml::is_cryxml(b"short"));
    }

    #[test]
    fn test_invalid_magic() {
        let result = CryXml::parse(b"InvalidMagic");
        assert!(matches!(result, Err(Error::InvalidMagic { .. })));
    }

    #[test]
    fn test_truncated_header() {
        let result = CryXml::parse(b"CryXmlB\0\x01\x02");
        assert!(matches!(result, Err(Error::Common(_))));
    }

    #[test]
    fn test_parse_tables() {
        let doc = CryXml::parse(&sample()).unwrap();
        assert_eq!(doc.len(), 2);

        let root = doc.root().unwrap();
        assert_eq!(doc.tag(root).unwrap(), "root");
        assert_eq!(doc.content(root).unwrap(), "");

        let attrs = doc.node_attributes(0).unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(doc.get_string(attrs[0].key_string_offset).unwrap(), "attr");
        assert_eq!(doc.get_string(attrs[0].value_string_offset).unwrap(), "1");

        assert_eq!(doc.children(0).unwrap(), vec![1]);
        assert_eq!(doc.tag(doc.node(1).unwrap()).unwrap(), "child");
        let parent = doc.node(1).unwrap().parent_index;
        assert_eq!(parent, 0);
    }

    #[test]
    fn test_table_past_end_of_buffer() {
        let mut bytes = sample();
        // node_count is the third header field.
        let node_count_at = CryXmlHeader::MAGIC_LEN + 8;
        bytes[node_count_at..node_count_at + 4].copy_from_slice(&1000u32.to_le_bytes());

        match CryXml::parse(&bytes) {
            Err(Error::TableOutOfBounds { table, size, .. }) => {
                assert_eq!(table, Table::Nodes);
                assert_eq!(size, 28_000);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_string_table_position_overflow() {
        let mut bytes = sample();
        let position_at = CryXmlHeader::MAGIC_LEN + 28;
        bytes[position_at..position_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(matches!(
            CryXml::parse(&bytes),
            Err(Error::TableOutOfBounds {
                table: Table::Strings,
                ..
            })
        ));
    }

    #[test]
    fn test_string_offsets_are_checked() {
        let doc = CryXml::parse(&sample()).unwrap();
        assert!(matches!(
            doc.get_string(10_000),
            Err(Error::StringOffsetOutOfBounds { offset: 10_000, .. })
        ));
    }

    #[test]
    fn test_unterminated_string_is_bounded() {
        let mut tables = RawTables::new();
        tables.strings = vec![b'a'; MAX_STRING_LEN + 10];
        tables.nodes.push(CryXmlNode {
            parent_index: -1,
            ..Default::default()
        });

        let doc = CryXml::parse(&tables.to_bytes().unwrap()).unwrap();
        assert!(matches!(
            doc.get_string(0),
            Err(Error::StringTooLong { offset: 0, .. })
        ));
        // Close enough to the end, the rest of the table is the string.
        assert_eq!(doc.get_string((MAX_STRING_LEN + 5) as u32).unwrap(), "aaaaa");
    }

    #[test]
    fn test_bad_child_reference() {
        let mut tables = RawTables::new();
        let tag = tables.push_string("root");
        tables.nodes.push(CryXmlNode {
            tag_string_offset: tag,
            content_string_offset: tag,
            child_count: 1,
            parent_index: -1,
            ..Default::default()
        });
        tables.child_indices.push(7);

        let doc = CryXml::parse(&tables.to_bytes().unwrap()).unwrap();
        assert!(matches!(
            doc.children(0),
            Err(Error::NodeIndexOutOfBounds { index: 7, count: 1 })
        ));
    }

    #[test]
    fn test_attribute_range_out_of_bounds() {
        let mut tables = RawTables::new();
        let tag = tables.push_string("root");
        tables.nodes.push(CryXmlNode {
            tag_string_offset: tag,
            attribute_count: 3,
            first_attribute_index: 1,
            parent_index: -1,
            ..Default::default()
        });

        let doc = CryXml::parse(&tables.to_bytes().unwrap()).unwrap();
        let err = doc.node_attributes(0).unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(
            err,
            Error::RangeOutOfBounds {
                table: Table::Attributes,
                first: 1,
                count: 3,
                size: 0,
                ..
            }
        ));
    }
}
