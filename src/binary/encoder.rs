//! Binary node encoder.
//!
//! A node is framed as a list header of size `1 + 2*len(attrs) +
//! (has_content ? 1 : 0)`, followed by the tag, then each attribute
//! key/value pair, then the content (nothing, a child list, or raw
//! bytes).

use super::node::{AttrValue, Attrs, Node, NodeContent};
use super::token::{
    self, AD_JID, BINARY_20, BINARY_32, BINARY_8, HEX_8, JID_PAIR, LIST_16, LIST_8, LIST_EMPTY,
    NIBBLE_8,
};
use crate::types::JID;

const NIBBLE_ALPHABET: &[u8] = b"0123456789-.";
const HEX_ALPHABET: &[u8] = b"0123456789abcdef";

pub struct Encoder {
    data: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn encode(node: &Node) -> Vec<u8> {
        let mut encoder = Self::new();
        encoder.write_node(node);
        encoder.data
    }

    fn write_byte(&mut self, b: u8) {
        self.data.push(b);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn write_list_header(&mut self, size: usize) {
        if size == 0 {
            self.write_byte(LIST_EMPTY);
        } else if size < 256 {
            self.write_byte(LIST_8);
            self.write_byte(size as u8);
        } else {
            self.write_byte(LIST_16);
            self.write_byte(((size >> 8) & 0xFF) as u8);
            self.write_byte((size & 0xFF) as u8);
        }
    }

    fn write_raw_string(&mut self, bytes: &[u8]) {
        if bytes.len() < 256 {
            self.write_byte(BINARY_8);
            self.write_byte(bytes.len() as u8);
        } else if bytes.len() < 1 << 20 {
            self.write_byte(BINARY_20);
            self.write_byte(((bytes.len() >> 16) & 0xFF) as u8);
            self.write_byte(((bytes.len() >> 8) & 0xFF) as u8);
            self.write_byte((bytes.len() & 0xFF) as u8);
        } else {
            self.write_byte(BINARY_32);
            self.write_bytes(&(bytes.len() as u32).to_be_bytes());
        }
        self.write_bytes(bytes);
    }

    /// Pack `s` into nibbles/hex digits if every character is in
    /// `alphabet`; returns `None` (fall back to a raw string) if not.
    fn write_packed(&mut self, tag: u8, alphabet: &[u8], s: &str) -> bool {
        let bytes = s.as_bytes();
        let mut nibbles = Vec::with_capacity(bytes.len());
        for &b in bytes {
            match alphabet.iter().position(|&c| c == b) {
                Some(idx) => nibbles.push(idx as u8),
                None => return false,
            }
        }

        self.write_byte(tag);
        let odd = nibbles.len() % 2 == 1;
        let byte_count = (nibbles.len() + 1) / 2;
        let header = (if odd { 0x80 } else { 0x00 }) | (byte_count as u8);
        self.write_byte(header);

        let mut iter = nibbles.chunks(2);
        for pair in &mut iter {
            let hi = pair[0];
            let lo = if pair.len() == 2 { pair[1] } else { 0x0F };
            self.write_byte((hi << 4) | lo);
        }
        true
    }

    fn write_string(&mut self, s: &str) {
        if let Some(index) = token::get_token_index(s) {
            self.write_byte(index);
            return;
        }
        if let Some((dict_tag, index)) = token::get_double_token_index(s) {
            self.write_byte(dict_tag);
            self.write_byte(index);
            return;
        }
        if !s.is_empty()
            && s.bytes().all(|b| NIBBLE_ALPHABET.contains(&b))
            && self.write_packed(NIBBLE_8, NIBBLE_ALPHABET, s)
        {
            return;
        }
        if !s.is_empty()
            && s.bytes().all(|b| HEX_ALPHABET.contains(&b))
            && self.write_packed(HEX_8, HEX_ALPHABET, s)
        {
            return;
        }
        self.write_raw_string(s.as_bytes());
    }

    fn write_jid(&mut self, jid: &JID) {
        if jid.is_ad() {
            self.write_byte(AD_JID);
            self.write_byte(jid.raw_agent);
            self.write_bytes(&jid.device.to_be_bytes());
            self.write_string(&jid.user);
        } else if JID::is_compact_eligible(&jid.server) {
            self.write_byte(JID_PAIR);
            self.write_string(&jid.user);
            self.write_string(&jid.server);
        } else {
            self.write_string(&jid.to_string());
        }
    }

    fn write_attr_value(&mut self, value: &AttrValue) {
        match value {
            AttrValue::JID(jid) => self.write_jid(jid),
            AttrValue::Bytes(b) => self.write_raw_string(b),
            other => {
                if let Some(s) = other.to_wire_string() {
                    self.write_string(&s);
                } else {
                    self.write_string("");
                }
            }
        }
    }

    fn write_attrs(&mut self, attrs: &Attrs) {
        for (key, value) in attrs {
            self.write_string(key);
            self.write_attr_value(value);
        }
    }

    fn write_node(&mut self, node: &Node) {
        let num_attrs = node.attrs.len();
        let has_content = !matches!(node.content, NodeContent::None);
        let list_size = 1 + 2 * num_attrs + usize::from(has_content);

        self.write_list_header(list_size);
        self.write_string(&node.tag);
        self.write_attrs(&node.attrs);

        match &node.content {
            NodeContent::None => {}
            NodeContent::Children(children) => {
                self.write_list_header(children.len());
                for child in children {
                    self.write_node(child);
                }
            }
            NodeContent::Bytes(bytes) => {
                self.write_raw_string(bytes);
            }
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn encode(node: &Node) -> Vec<u8> {
    Encoder::encode(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_simple_node() {
        let mut node = Node::new("message");
        node.set_attr("id", "123");

        let encoded = encode(&node);
        assert!(!encoded.is_empty());
    }

    #[test]
    fn test_encode_empty_node_list_header() {
        let node = Node::new("iq");
        let encoded = encode(&node);
        // list header for size 1 (just the tag, no attrs/content) is LIST_8, 1
        assert_eq!(encoded[0], LIST_8);
        assert_eq!(encoded[1], 1);
    }
}
