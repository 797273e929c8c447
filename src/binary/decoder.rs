//! Binary node decoder, the inverse of `encoder::Encoder`.

use super::node::{AttrValue, Attrs, Node, NodeContent};
use super::token::{
    self, get_token, AD_JID, BINARY_20, BINARY_32, BINARY_8, HEX_8, JID_PAIR, LIST_16, LIST_8,
    LIST_EMPTY, NIBBLE_8, STREAM_END,
};
use crate::error::ProtocolError;
use crate::types::JID;

const NIBBLE_ALPHABET: &[u8] = b"0123456789-.";
const HEX_ALPHABET: &[u8] = b"0123456789abcdef";

pub struct Decoder<'a> {
    data: &'a [u8],
    index: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, index: 0 }
    }

    pub fn decode(data: &[u8]) -> Result<Node, ProtocolError> {
        let mut decoder = Decoder::new(data);
        let node = decoder.read_node()?;
        if decoder.index != decoder.data.len() {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(node)
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        let b = *self.data.get(self.index).ok_or(ProtocolError::UnexpectedEof)?;
        self.index += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        if self.index + n > self.data.len() {
            return Err(ProtocolError::UnexpectedEof);
        }
        let bytes = self.data[self.index..self.index + n].to_vec();
        self.index += n;
        Ok(bytes)
    }

    fn read_int(&mut self, bytes: usize) -> Result<usize, ProtocolError> {
        let mut result = 0usize;
        for _ in 0..bytes {
            result = (result << 8) | (self.read_byte()? as usize);
        }
        Ok(result)
    }

    fn read_raw_string_len(&mut self, tag: u8) -> Result<usize, ProtocolError> {
        match tag {
            BINARY_8 => Ok(self.read_byte()? as usize),
            BINARY_20 => self.read_int(3),
            BINARY_32 => self.read_int(4),
            _ => Err(ProtocolError::UnknownTag(tag)),
        }
    }

    fn read_packed(&mut self, alphabet: &[u8]) -> Result<String, ProtocolError> {
        let header = self.read_byte()?;
        let odd = header & 0x80 != 0;
        let byte_count = (header & 0x7F) as usize;
        let bytes = self.read_bytes(byte_count)?;

        let mut out = String::with_capacity(byte_count * 2);
        for (i, b) in bytes.iter().enumerate() {
            let hi = b >> 4;
            let lo = b & 0x0F;
            out.push(
                *alphabet
                    .get(hi as usize)
                    .ok_or(ProtocolError::InvalidPackedString)? as char,
            );
            let is_last = i == bytes.len() - 1;
            if !(is_last && odd) {
                out.push(
                    *alphabet
                        .get(lo as usize)
                        .ok_or(ProtocolError::InvalidPackedString)? as char,
                );
            }
        }
        Ok(out)
    }

    /// Read a string given its leading tag byte.
    fn read_string(&mut self, tag: u8) -> Result<String, ProtocolError> {
        match tag {
            LIST_EMPTY => Ok(String::new()),
            BINARY_8 | BINARY_20 | BINARY_32 => {
                let len = self.read_raw_string_len(tag)?;
                let bytes = self.read_bytes(len)?;
                String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidPackedString)
            }
            NIBBLE_8 => self.read_packed(NIBBLE_ALPHABET),
            HEX_8 => self.read_packed(HEX_ALPHABET),
            tag if token::is_dictionary_tag(tag) => {
                let index = self.read_byte()?;
                token::get_double_token(tag, index)
                    .map(str::to_string)
                    .ok_or(ProtocolError::InvalidTokenIndex(index))
            }
            tag => get_token(tag)
                .map(str::to_string)
                .ok_or(ProtocolError::UnknownTag(tag)),
        }
    }

    fn read_jid(&mut self, marker: u8) -> Result<JID, ProtocolError> {
        match marker {
            JID_PAIR => {
                let user_tag = self.read_byte()?;
                let user = self.read_string(user_tag)?;
                let server_tag = self.read_byte()?;
                let server = self.read_string(server_tag)?;
                Ok(JID::new(user, server))
            }
            AD_JID => {
                let agent = self.read_byte()?;
                let device_bytes = self.read_bytes(2)?;
                let device = u16::from_be_bytes([device_bytes[0], device_bytes[1]]);
                let user_tag = self.read_byte()?;
                let user = self.read_string(user_tag)?;
                Ok(JID::new_ad(user, agent, device as u8).with_device(device))
            }
            _ => Err(ProtocolError::InvalidJid),
        }
    }

    fn read_attr_value(&mut self) -> Result<AttrValue, ProtocolError> {
        let tag = self.read_byte()?;
        match tag {
            LIST_EMPTY => Ok(AttrValue::None),
            JID_PAIR | AD_JID => Ok(AttrValue::JID(self.read_jid(tag)?)),
            BINARY_8 | BINARY_20 | BINARY_32 => {
                let len = self.read_raw_string_len(tag)?;
                Ok(AttrValue::Bytes(self.read_bytes(len)?))
            }
            _ => Ok(AttrValue::String(self.read_string(tag)?)),
        }
    }

    fn read_list_size(&mut self, tag: u8) -> Result<usize, ProtocolError> {
        match tag {
            LIST_EMPTY => Ok(0),
            LIST_8 => Ok(self.read_byte()? as usize),
            LIST_16 => self.read_int(2),
            _ => Err(ProtocolError::UnknownTag(tag)),
        }
    }

    fn read_node(&mut self) -> Result<Node, ProtocolError> {
        let header_tag = self.read_byte()?;
        let size = self.read_list_size(header_tag)?;
        if size == 0 {
            return Err(ProtocolError::InvalidListSize(0));
        }

        let tag_marker = self.read_byte()?;
        let tag = self.read_string(tag_marker)?;

        let mut attrs = Attrs::new();
        let num_attr_pairs = (size - 1) / 2;
        for _ in 0..num_attr_pairs {
            let key_marker = self.read_byte()?;
            let key = self.read_string(key_marker)?;
            let value = self.read_attr_value()?;
            attrs.insert(key, value);
        }

        let has_content = (size - 1) % 2 == 1;
        let content = if has_content {
            let content_marker = self.read_byte()?;
            match content_marker {
                LIST_EMPTY | LIST_8 | LIST_16 => {
                    let len = self.read_list_size(content_marker)?;
                    let mut children = Vec::with_capacity(len);
                    for _ in 0..len {
                        children.push(self.read_node()?);
                    }
                    NodeContent::Children(children)
                }
                BINARY_8 | BINARY_20 | BINARY_32 => {
                    let len = self.read_raw_string_len(content_marker)?;
                    NodeContent::Bytes(self.read_bytes(len)?)
                }
                _ => NodeContent::Bytes(self.read_string(content_marker)?.into_bytes()),
            }
        } else {
            NodeContent::None
        };

        Ok(Node { tag, attrs, content })
    }
}

pub fn decode(data: &[u8]) -> Result<Node, ProtocolError> {
    Decoder::decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::encoder::encode;

    #[test]
    fn test_roundtrip_simple() {
        let mut node = Node::new("message");
        node.set_attr("id", "test123");
        node.set_attr("type", "text");

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_roundtrip_empty_iq() {
        let mut node = Node::new("iq");
        node.set_attr("id", "1");
        node.set_attr("type", "get");
        node.set_attr("xmlns", "passive");

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_roundtrip_with_children_and_bytes() {
        let mut node = Node::new("iq");
        node.set_attr("id", "abc123");
        let mut query = Node::new("query");
        query.set_bytes(vec![1, 2, 3, 4, 5]);
        node.add_child(query);

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_roundtrip_preserves_attribute_order() {
        let mut node = Node::new("iq");
        node.set_attr("to", "1@s.whatsapp.net");
        node.set_attr("id", "abc");
        node.set_attr("type", "get");

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();

        let keys: Vec<&str> = decoded.attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["to", "id", "type"]);
    }

    #[test]
    fn test_roundtrip_jid_pair() {
        let mut node = Node::new("presence");
        node.set_attr("from", JID::new("123456789", "s.whatsapp.net"));

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.get_attr_jid("from"), Some(&JID::new("123456789", "s.whatsapp.net")));
    }

    #[test]
    fn test_roundtrip_ad_jid() {
        let mut node = Node::new("message");
        let jid = JID::new_ad("123456789", 0, 5).with_device(5);
        node.set_attr("from", jid.clone());

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.get_attr_jid("from"), Some(&jid));
    }

    #[test]
    fn test_roundtrip_numeric_attribute_nibble_packed() {
        let mut node = Node::new("receipt");
        node.set_attr("t", "1700000000");

        let encoded = encode(&node);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.get_attr_str("t"), Some("1700000000"));
    }

    #[test]
    fn test_stream_end_tag_byte_is_rejected_as_a_node_tag() {
        // STREAM_END (2) is a reserved structural marker, not an
        // assigned token, so it can never name a node.
        let data = vec![LIST_8, 1, STREAM_END];
        assert!(decode(&data).is_err());
    }

    #[test]
    fn test_truncated_node_is_rejected() {
        let mut node = Node::new("iq");
        node.set_attr("id", "abc123");
        let mut encoded = encode(&node);
        encoded.truncate(encoded.len() - 2);
        assert!(decode(&encoded).is_err());
    }
}
