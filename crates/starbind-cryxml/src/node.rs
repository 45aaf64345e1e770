//! CryXmlB node structure.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// A node in the CryXmlB tree.
///
/// Nodes are stored in a flat array and reference each other by index. Index
/// 0 is the document root.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CryXmlNode {
    /// Offset into the string table for the tag name.
    pub tag_string_offset: u32,
    /// Offset into the string table for the text content (usually empty).
    pub content_string_offset: u32,
    /// Number of attributes on this node.
    pub attribute_count: u16,
    /// Number of child nodes.
    pub child_count: u16,
    /// Parent node index (-1 for root).
    pub parent_index: i32,
    /// Index of the first attribute in the attribute table.
    pub first_attribute_index: i32,
    /// Index of the first entry in the child index table.
    pub first_child_index: i32,
    pub _padding: u32,
}

impl CryXmlNode {
    /// Size of one node record.
    pub const SIZE: usize = 28;

    /// Number of attributes, copied out of the packed record.
    #[inline]
    pub fn attributes(&self) -> usize {
        self.attribute_count as usize
    }

    /// Number of children, copied out of the packed record.
    #[inline]
    pub fn children(&self) -> usize {
        self.child_count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_size() {
        assert_eq!(std::mem::size_of::<CryXmlNode>(), CryXmlNode::SIZE);
    }
}
