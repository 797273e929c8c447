//! Binary-node element type for the WhatsApp wire format.

use crate::types::JID;

/// Order-preserving attribute map. A `HashMap` cannot satisfy the
/// requirement that a decoded node's attribute iteration order match
/// the order the attributes appeared on the wire, so attributes are
/// kept in a plain insertion-ordered vector instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attrs(Vec<(String, AttrValue)>);

impl Attrs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn insert(&mut self, key: String, value: AttrValue) {
        if let Some(existing) = self.0.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'a> IntoIterator for &'a Attrs {
    type Item = (&'a str, &'a AttrValue);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a AttrValue)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<(String, AttrValue)> for Attrs {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        let mut attrs = Attrs::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// Possible values for a node attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    None,
    String(String),
    Bytes(Vec<u8>),
    Int(i64),
    Bool(bool),
    JID(JID),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<JID> for AttrValue {
    fn from(jid: JID) -> Self {
        AttrValue::JID(jid)
    }
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_jid(&self) -> Option<&JID> {
        match self {
            AttrValue::JID(jid) => Some(jid),
            _ => None,
        }
    }

    /// String form written to the wire for attribute-value encoding:
    /// every non-bytes variant round-trips through a string.
    pub fn to_wire_string(&self) -> Option<String> {
        match self {
            AttrValue::None => None,
            AttrValue::String(s) => Some(s.clone()),
            AttrValue::Int(n) => Some(n.to_string()),
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::JID(jid) => Some(jid.to_string()),
            AttrValue::Bytes(_) => None,
        }
    }
}

/// A binary-node element: a tag, an ordered attribute set, and
/// content that is exactly one of nothing, child nodes, or raw bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub tag: String,
    pub attrs: Attrs,
    pub content: NodeContent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeContent {
    #[default]
    None,
    Children(Vec<Node>),
    Bytes(Vec<u8>),
}

impl Node {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attrs::new(),
            content: NodeContent::None,
        }
    }

    pub fn with_attrs(tag: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            tag: tag.into(),
            attrs,
            content: NodeContent::None,
        }
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn get_attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }

    pub fn get_attr_int(&self, key: &str) -> Option<i64> {
        self.attrs.get(key).and_then(|v| v.as_int())
    }

    pub fn get_attr_jid(&self, key: &str) -> Option<&JID> {
        self.attrs.get(key).and_then(|v| v.as_jid())
    }

    pub fn set_children(&mut self, children: Vec<Node>) {
        self.content = NodeContent::Children(children);
    }

    pub fn add_child(&mut self, child: Node) {
        match &mut self.content {
            NodeContent::Children(children) => children.push(child),
            _ => self.content = NodeContent::Children(vec![child]),
        }
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.content = NodeContent::Bytes(bytes);
    }

    pub fn get_children(&self) -> Option<&[Node]> {
        match &self.content {
            NodeContent::Children(children) => Some(children),
            _ => None,
        }
    }

    pub fn get_children_by_tag(&self, tag: &str) -> Vec<&Node> {
        match &self.content {
            NodeContent::Children(children) => children.iter().filter(|n| n.tag == tag).collect(),
            _ => Vec::new(),
        }
    }

    pub fn get_child_by_tag(&self, tag: &str) -> Option<&Node> {
        self.get_children_by_tag(tag).into_iter().next()
    }

    pub fn get_optional_child_by_tag(&self, tags: &[&str]) -> Option<&Node> {
        let mut current = self;
        for tag in tags {
            current = current.get_child_by_tag(tag)?;
        }
        Some(current)
    }

    pub fn get_bytes(&self) -> Option<&[u8]> {
        match &self.content {
            NodeContent::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let mut node = Node::new("message");
        node.set_attr("id", "123");
        node.set_attr("type", "text");

        assert_eq!(node.tag, "message");
        assert_eq!(node.get_attr_str("id"), Some("123"));
        assert_eq!(node.get_attr_str("type"), Some("text"));
    }

    #[test]
    fn test_node_children() {
        let mut parent = Node::new("iq");
        let child1 = Node::new("query");
        let child2 = Node::new("result");

        parent.add_child(child1);
        parent.add_child(child2);

        let children = parent.get_children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].tag, "query");
        assert_eq!(children[1].tag, "result");
    }

    #[test]
    fn test_node_bytes() {
        let mut node = Node::new("media");
        node.set_bytes(vec![1, 2, 3, 4]);

        assert_eq!(node.get_bytes(), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn test_attribute_order_preserved() {
        let mut node = Node::new("iq");
        node.set_attr("to", "1@s.whatsapp.net");
        node.set_attr("id", "abc");
        node.set_attr("type", "get");

        let keys: Vec<&str> = node.attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["to", "id", "type"]);
    }

    #[test]
    fn test_set_attr_overwrite_keeps_position() {
        let mut node = Node::new("iq");
        node.set_attr("to", "1@s.whatsapp.net");
        node.set_attr("id", "abc");
        node.set_attr("to", "2@s.whatsapp.net");

        let keys: Vec<&str> = node.attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["to", "id"]);
        assert_eq!(node.get_attr_str("to"), Some("2@s.whatsapp.net"));
    }
}
