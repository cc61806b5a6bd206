use super::context::{NodeText, SimpleContext};
use super::expression_scanner::identifiers;
use std::ops::Range;
use tree_sitter::Node;

/// One outer `#[...]` attribute of an item or field.
#[derive(Debug, Clone)]
pub struct Attribute<'t> {
    pub item: Node<'t>,
    pub path: String,
    /// Delimited token tree after the path, parentheses included.
    pub arguments: Option<Node<'t>>,
}

impl<'t> Attribute<'t> {
    pub fn from_item(item: Node<'t>, ctx: &SimpleContext) -> Option<Self> {
        let mut cursor = item.walk();
        let attribute = item
            .named_children(&mut cursor)
            .find(|n| n.kind() == "attribute")?;
        let path = attribute.named_child(0)?;
        Some(Self {
            item,
            path: ctx.get_node_text(path).to_string(),
            arguments: attribute.child_by_field_name("arguments"),
        })
    }

    pub fn is(&self, name: &str) -> bool {
        self.path == name || self.path.ends_with(&format!("::{}", name))
    }

    /// Byte range between the argument delimiters.
    pub fn content_range(&self) -> Option<Range<usize>> {
        let args = self.arguments?;
        let range = args.byte_range();
        (range.len() >= 2).then(|| range.start + 1..range.end - 1)
    }

    pub fn content<'s>(&self, source: &'s str) -> Option<&'s str> {
        self.content_range().map(|r| &source[r])
    }

    pub fn derives(&self, trait_name: &str, source: &str) -> bool {
        self.is("derive")
            && self
                .content(source)
                .map(|c| identifiers(c).iter().any(|i| i == trait_name))
                .unwrap_or(false)
    }
}

/// Attributes written directly above `node`, in source order, and whether a
/// `/// CHECK:` comment is among them.
pub fn attributes_before<'t>(node: Node<'t>, ctx: &SimpleContext) -> (Vec<Attribute<'t>>, bool) {
    let mut attributes = Vec::new();
    let mut has_check = false;
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        match sibling.kind() {
            "attribute_item" => {
                if let Some(attribute) = Attribute::from_item(sibling, ctx) {
                    attributes.push(attribute);
                }
            }
            "line_comment" | "block_comment" => {
                let text = ctx.get_node_text(sibling);
                let body = text.trim_start_matches(['/', '*', '!']).trim_start();
                if body.starts_with("CHECK") {
                    has_check = true;
                }
            }
            _ => break,
        }
        current = sibling.prev_sibling();
    }

    attributes.reverse();
    (attributes, has_check)
}

pub fn find<'a, 't>(attributes: &'a [Attribute<'t>], name: &str) -> Option<&'a Attribute<'t>> {
    attributes.iter().find(|a| a.is(name))
}
