//! Tag bytes and token dictionaries for the binary node wire format.
//!
//! Byte `0` and `2` are reserved structural markers (`LIST_EMPTY`,
//! `STREAM_END`) and are never assigned a token. Bytes `3..=235` index
//! directly into [`SINGLE_BYTE_TOKENS`]. Bytes `236..=239`
//! (`DICTIONARY_0..DICTIONARY_3`) select one of four secondary
//! double-byte dictionaries, each holding up to 256 more tokens.
//! Everything above `239` is a structural tag (`AD_JID`, `LIST_8`,
//! `LIST_16`, `JID_PAIR`, `HEX_8`, `BINARY_8/20/32`, `NIBBLE_8`).

use std::collections::HashMap;
use std::sync::OnceLock;

pub const LIST_EMPTY: u8 = 0;
pub const STREAM_END: u8 = 2;
pub const DICTIONARY_0: u8 = 236;
pub const DICTIONARY_1: u8 = 237;
pub const DICTIONARY_2: u8 = 238;
pub const DICTIONARY_3: u8 = 239;
pub const AD_JID: u8 = 247;
pub const LIST_8: u8 = 248;
pub const LIST_16: u8 = 249;
pub const JID_PAIR: u8 = 250;
pub const HEX_8: u8 = 251;
pub const BINARY_8: u8 = 252;
pub const BINARY_20: u8 = 253;
pub const BINARY_32: u8 = 254;
pub const NIBBLE_8: u8 = 255;

pub fn is_dictionary_tag(tag: u8) -> bool {
    (DICTIONARY_0..=DICTIONARY_3).contains(&tag)
}

pub fn dictionary_index(tag: u8) -> Option<usize> {
    if is_dictionary_tag(tag) {
        Some((tag - DICTIONARY_0) as usize)
    } else {
        None
    }
}

/// Primary single-byte token table. `SINGLE_BYTE_TOKENS[i]` is the
/// token for tag byte `i`; empty strings at reserved/unused indices
/// are never matched by `get_token_index`.
pub const SINGLE_BYTE_TOKENS: &[&str] = &[
    "", "unused_1", "", "xmlstreamstart", "xmlstreamend", "s.whatsapp.net", "type", "from", "to",
    "id", "class", "notify", "participant", "server", "read", "received", "action", "relay",
    "chat", "group", "g.us", "broadcast", "status", "user", "features", "xmlns", "stream:error",
    "iq", "get", "set", "result", "error", "success", "failure", "challenge", "response",
    "stream:features", "compress", "urn:xmpp:ping", "passive", "active", "w:p", "usync", "jid",
    "query", "list", "item", "presence", "available", "unavailable", "composing", "paused",
    "recording", "offline", "message", "body", "text", "media", "image", "video", "audio",
    "document", "sticker", "location", "contact", "vcard", "url", "mimetype", "filehash",
    "filesize", "mediakey", "caption", "duration", "seconds", "thumbnail", "receipt", "delivery",
    "played", "ack", "key", "value", "count", "index", "pushname", "verified_name", "business",
    "profile", "picture", "status_msg", "notification", "device", "identity", "devices", "key-index",
    "registration", "signature", "ref", "code", "pairing", "pair-device", "pair-success",
    "pair-error", "platform", "companion_enc", "advIdentity", "advSig", "advDetails", "hmac",
    "account", "wid", "companion", "encoding", "enc", "plain", "removed", "add", "remove",
    "modify", "promote", "demote", "subject", "description", "create", "invite", "announcement",
    "locked", "ephemeral", "disappearing_mode", "w:g2", "w:b", "w:stats", "encrypt", "prekeys",
    "skey", "otts", "identity-key", "signed-key", "v", "keys", "rc", "t", "notify_count", "edge",
    "routing_info", "abprops", "usyncprops", "props", "prop", "hash", "config_value", "version",
    "platform-type", "web", "os", "manufacturer", "build_number", "expiration", "dictionary_0",
    "dictionary_1", "dictionary_2", "dictionary_3", "reserved_155", "reserved_156", "reserved_157",
    "reserved_158", "reserved_159", "reserved_160", "reserved_161", "reserved_162", "reserved_163",
    "reserved_164", "reserved_165", "reserved_166", "reserved_167", "reserved_168", "reserved_169",
    "reserved_170", "reserved_171", "reserved_172", "reserved_173", "reserved_174", "reserved_175",
    "reserved_176", "reserved_177", "reserved_178", "reserved_179", "reserved_180", "reserved_181",
    "reserved_182", "reserved_183", "reserved_184", "reserved_185", "reserved_186", "reserved_187",
    "reserved_188", "reserved_189", "reserved_190", "reserved_191", "reserved_192", "reserved_193",
    "reserved_194", "reserved_195", "reserved_196", "reserved_197", "reserved_198", "reserved_199",
    "reserved_200", "reserved_201", "reserved_202", "reserved_203", "reserved_204", "reserved_205",
    "reserved_206", "reserved_207", "reserved_208", "reserved_209", "reserved_210", "reserved_211",
    "reserved_212", "reserved_213", "reserved_214", "reserved_215", "reserved_216", "reserved_217",
    "reserved_218", "reserved_219", "reserved_220", "reserved_221", "reserved_222", "reserved_223",
    "reserved_224", "reserved_225", "reserved_226", "reserved_227", "reserved_228", "reserved_229",
    "reserved_230", "reserved_231", "reserved_232", "reserved_233", "reserved_234", "reserved_235",
];

/// Four secondary dictionaries, addressed by `DICTIONARY_0..3` plus a
/// following index byte. Keeps the primary table from having to hold
/// every namespace/attribute string WhatsApp uses.
pub const DOUBLE_BYTE_DICTIONARIES: [&[&str]; 4] = [
    &[
        "interactive", "buttons", "list_message", "template", "ephemeralSettingTimestamp",
        "disappearing_duration", "biz", "catalog", "product", "order", "payment", "invoice",
        "newsletter", "community", "sub_group", "linked_group", "lid", "hosted", "hosted.lid",
        "bot", "msgr", "interop", "usync_device", "usync_disappearing_mode",
    ],
    &[
        "stream:management", "ack-request", "r", "handshake", "client-hello", "client-finish",
        "server-hello", "static", "ephemeral", "payload", "ciphertext", "noise-retry",
        "verified-name-certificate", "details", "serial", "issuer", "verified-level",
        "issue-time", "localized-names",
    ],
    &[
        "w:sync:app:state", "collection", "patch", "snapshot", "mutation", "key-id", "value-mac",
        "index-mac", "version-mac", "lthash", "external_hash_v2", "name", "operation",
    ],
    &[
        "xml", "error-text", "reason", "conflict", "replaced", "logged-out", "banned",
        "temp-banned", "connection-replaced", "restart-required", "515", "401", "403",
    ],
];

fn token_index_map() -> &'static HashMap<&'static str, u8> {
    static MAP: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();
    MAP.get_or_init(|| {
        SINGLE_BYTE_TOKENS
            .iter()
            .enumerate()
            .filter(|(i, s)| *i != LIST_EMPTY as usize && *i != STREAM_END as usize && !s.is_empty())
            .map(|(i, s)| (*s, i as u8))
            .collect()
    })
}

fn double_byte_index_maps() -> &'static [HashMap<&'static str, u8>; 4] {
    static MAPS: OnceLock<[HashMap<&'static str, u8>; 4]> = OnceLock::new();
    MAPS.get_or_init(|| {
        let mut maps: [HashMap<&'static str, u8>; 4] = Default::default();
        for (dict_idx, dict) in DOUBLE_BYTE_DICTIONARIES.iter().enumerate() {
            for (i, s) in dict.iter().enumerate() {
                maps[dict_idx].insert(*s, i as u8);
            }
        }
        maps
    })
}

/// Look up a single-byte tag for `token`, if it is in the primary
/// table.
pub fn get_token_index(token: &str) -> Option<u8> {
    token_index_map().get(token).copied()
}

/// Look up `(dictionary_tag, index)` for `token` in one of the four
/// secondary dictionaries.
pub fn get_double_token_index(token: &str) -> Option<(u8, u8)> {
    let maps = double_byte_index_maps();
    for (dict_idx, map) in maps.iter().enumerate() {
        if let Some(index) = map.get(token) {
            return Some((DICTIONARY_0 + dict_idx as u8, *index));
        }
    }
    None
}

/// Reverse lookup for a primary single-byte tag.
pub fn get_token(index: u8) -> Option<&'static str> {
    SINGLE_BYTE_TOKENS
        .get(index as usize)
        .filter(|s| !s.is_empty())
        .copied()
}

/// Reverse lookup within one of the four secondary dictionaries.
pub fn get_double_token(dict_tag: u8, index: u8) -> Option<&'static str> {
    let dict_idx = dictionary_index(dict_tag)?;
    DOUBLE_BYTE_DICTIONARIES
        .get(dict_idx)
        .and_then(|d| d.get(index as usize))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lookup() {
        let idx = get_token_index("iq").unwrap();
        assert_eq!(get_token(idx), Some("iq"));
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(get_token(27), Some("iq"));
    }

    #[test]
    fn test_unknown_token() {
        assert_eq!(get_token_index("definitely-not-a-token"), None);
    }

    #[test]
    fn test_double_byte_round_trip() {
        let (tag, index) = get_double_token_index("biz").unwrap();
        assert_eq!(get_double_token(tag, index), Some("biz"));
    }

    #[test]
    fn test_reserved_indices_never_match() {
        assert_eq!(get_token(LIST_EMPTY), None);
        assert_eq!(get_token(STREAM_END), None);
    }
}
