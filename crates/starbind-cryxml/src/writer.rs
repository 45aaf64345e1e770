//! Textual XML output.
//!
//! The node tree is walked with an explicit stack so that neither deep
//! nesting nor a corrupt child table can exhaust the call stack. Every frame
//! pushed counts against a budget of three frames per node; a well-formed
//! tree needs at most two (one to open, one to close), so running out means
//! the child table revisits nodes.

use std::io::Write;

use log::trace;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::{CryXml, Error, Result};

/// Formatting options for XML output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlOptions {
    /// Spaces per nesting level; zero writes everything on one line.
    pub indent: usize,
    /// Emit an `<?xml ...?>` declaration first.
    pub declaration: bool,
}

impl Default for XmlOptions {
    fn default() -> Self {
        Self {
            indent: 2,
            declaration: true,
        }
    }
}

impl XmlOptions {
    /// Single line, no declaration.
    pub fn compact() -> Self {
        Self {
            indent: 0,
            declaration: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    index: usize,
    depth: usize,
    closing: bool,
}

impl CryXml {
    /// Frames the traversal may push before it gives up.
    pub fn iteration_limit(&self) -> usize {
        self.len().saturating_mul(3)
    }

    /// Convert to an XML string with default formatting.
    pub fn to_xml_string(&self) -> Result<String> {
        self.to_xml_string_with(&XmlOptions::default())
    }

    /// Convert to an XML string.
    pub fn to_xml_string_with(&self, options: &XmlOptions) -> Result<String> {
        let mut output = Vec::new();
        self.write_xml_with(&mut output, options)?;
        String::from_utf8(output).map_err(|e| Error::Xml(e.to_string()))
    }

    /// Write XML with default formatting.
    pub fn write_xml<W: Write>(&self, writer: W) -> Result<()> {
        self.write_xml_with(writer, &XmlOptions::default())
    }

    /// Write XML to a writer.
    pub fn write_xml_with<W: Write>(&self, writer: W, options: &XmlOptions) -> Result<()> {
        if self.is_empty() {
            return Err(Error::EmptyDocument);
        }

        let mut xml = if options.indent > 0 {
            Writer::new_with_indent(writer, b' ', options.indent)
        } else {
            Writer::new(writer)
        };

        if options.declaration {
            emit(&mut xml, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        }

        let limit = self.iteration_limit();
        let mut pushed = 1;
        let mut stack = vec![Frame {
            index: 0,
            depth: 0,
            closing: false,
        }];

        while let Some(frame) = stack.pop() {
            let node = self.node_at(frame.index)?;
            let tag = self.tag(node)?;

            if frame.closing {
                emit(&mut xml, Event::End(BytesEnd::new(tag)))?;
                continue;
            }

            let mut element = BytesStart::new(tag);
            for attr in self.node_attributes(frame.index)? {
                let key = self.get_string(attr.key_string_offset)?;
                let value = self.get_string(attr.value_string_offset)?;
                element.push_attribute((key, value));
            }

            let content = self.content(node)?;
            let children = self.child_indices(frame.index)?;
            if children.is_empty() && content.is_empty() {
                emit(&mut xml, Event::Empty(element))?;
                continue;
            }

            emit(&mut xml, Event::Start(element))?;
            if !content.is_empty() {
                emit(&mut xml, Event::Text(BytesText::new(content)))?;
            }

            pushed += 1 + children.len();
            if pushed > limit {
                return Err(Error::IterationLimit {
                    limit,
                    node: frame.index,
                    depth: frame.depth,
                });
            }

            stack.push(Frame {
                closing: true,
                ..frame
            });
            for &raw in children.iter().rev() {
                stack.push(Frame {
                    index: self.resolve_node(raw)?,
                    depth: frame.depth + 1,
                    closing: false,
                });
            }
        }

        trace!("wrote {} nodes using {} of {} frames", self.len(), pushed, limit);
        Ok(())
    }
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Xml(e.to_string()))
}

#[cfg(test)]
mod tests {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    use super::*;
    use crate::builder::{BuilderNode, CryXmlBuilder, RawTables};
    use crate::CryXmlNode;

    fn decode(root: BuilderNode, options: &XmlOptions) -> String {
        let bytes = CryXmlBuilder::new(root).build().unwrap();
        CryXml::parse(&bytes)
            .unwrap()
            .to_xml_string_with(options)
            .unwrap()
    }

    /// Flatten XML text into one line per element: indentation for depth,
    /// then the name and its attributes in order.
    fn outline(xml: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut lines = Vec::new();
        let mut depth = 0;
        loop {
            let (element, opens) = match reader.read_event().unwrap() {
                Event::Start(e) => (e, true),
                Event::Empty(e) => (e, false),
                Event::End(_) => {
                    depth -= 1;
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let mut line = "  ".repeat(depth);
            line.push_str(std::str::from_utf8(element.name().as_ref()).unwrap());
            for attr in element.attributes() {
                let attr = attr.unwrap();
                line.push_str(&format!(
                    " {}={}",
                    std::str::from_utf8(attr.key.as_ref()).unwrap(),
                    attr.unescape_value().unwrap()
                ));
            }
            lines.push(line);

            if opens {
                depth += 1;
            }
        }
        lines
    }

    #[test]
    fn test_round_trip_reparses_to_same_tree() {
        let xml = decode(
            BuilderNode::new("root")
                .attr("attr", "1")
                .child(BuilderNode::new("child")),
            &XmlOptions::default(),
        );

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert_eq!(outline(&xml), ["root attr=1", "  child"]);
    }

    #[test]
    fn test_compact_output() {
        let xml = decode(
            BuilderNode::new("root")
                .attr("attr", "1")
                .child(BuilderNode::new("child")),
            &XmlOptions::compact(),
        );
        assert_eq!(xml, r#"<root attr="1"><child/></root>"#);
    }

    #[test]
    fn test_children_keep_document_order() {
        let root = BuilderNode::new("ActionMaps").children([
            BuilderNode::new("actionmap")
                .attr("name", "spaceship_movement")
                .child(BuilderNode::new("action").attr("name", "v_pitch"))
                .child(BuilderNode::new("action").attr("name", "v_yaw")),
            BuilderNode::new("actionmap").attr("name", "player"),
        ]);

        let xml = decode(root, &XmlOptions::default());
        assert_eq!(
            outline(&xml),
            [
                "ActionMaps",
                "  actionmap name=spaceship_movement",
                "    action name=v_pitch",
                "    action name=v_yaw",
                "  actionmap name=player",
            ]
        );
    }

    #[test]
    fn test_text_content_and_escaping() {
        let xml = decode(
            BuilderNode::new("entry")
                .attr("label", "a \"quoted\" <value>")
                .content("x < y & z"),
            &XmlOptions::compact(),
        );
        assert_eq!(
            xml,
            r#"<entry label="a &quot;quoted&quot; &lt;value&gt;">x &lt; y &amp; z</entry>"#
        );
    }

    #[test]
    fn test_self_cycle_hits_iteration_limit() {
        let mut tables = RawTables::new();
        let tag = tables.push_string("loop");
        tables.nodes.push(CryXmlNode {
            tag_string_offset: tag,
            content_string_offset: tag + 4,
            child_count: 1,
            parent_index: -1,
            ..Default::default()
        });
        tables.child_indices.push(0);

        let doc = CryXml::parse(&tables.to_bytes().unwrap()).unwrap();
        let err = doc.to_xml_string().unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(
            err,
            Error::IterationLimit {
                limit: 3,
                node: 0,
                depth: 1,
            }
        ));
    }

    #[test]
    fn test_two_node_cycle_hits_iteration_limit() {
        let mut tables = RawTables::new();
        let a = tables.push_string("a");
        let b = tables.push_string("b");
        let empty = tables.push_string("");
        for (tag, first_child) in [(a, 0), (b, 1)] {
            tables.nodes.push(CryXmlNode {
                tag_string_offset: tag,
                content_string_offset: empty,
                child_count: 1,
                first_child_index: first_child,
                parent_index: -1,
                ..Default::default()
            });
        }
        tables.child_indices.extend([1, 0]);

        let doc = CryXml::parse(&tables.to_bytes().unwrap()).unwrap();
        assert!(matches!(
            doc.to_xml_string(),
            Err(Error::IterationLimit { limit: 6, .. })
        ));
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        const DEPTH: usize = 50_000;

        let mut tables = RawTables::new();
        let tag = tables.push_string("n");
        let empty = tables.push_string("");
        for i in 0..DEPTH {
            let last = i + 1 == DEPTH;
            tables.nodes.push(CryXmlNode {
                tag_string_offset: tag,
                content_string_offset: empty,
                child_count: if last { 0 } else { 1 },
                parent_index: i as i32 - 1,
                first_child_index: i as i32,
                ..Default::default()
            });
            if !last {
                tables.child_indices.push(i as i32 + 1);
            }
        }

        let doc = CryXml::parse(&tables.to_bytes().unwrap()).unwrap();
        let xml = doc.to_xml_string_with(&XmlOptions::compact()).unwrap();
        assert!(xml.starts_with("<n><n><n>"));
        assert!(xml.ends_with("<n/></n></n>"));
        assert_eq!(xml.matches("</n>").count(), DEPTH - 1);
    }

    #[test]
    fn test_empty_document() {
        let bytes = RawTables::new().to_bytes().unwrap();
        let doc = CryXml::parse(&bytes).unwrap();
        assert!(matches!(doc.to_xml_string(), Err(Error::EmptyDocument)));
    }
}
