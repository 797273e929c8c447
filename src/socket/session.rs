//! The live connection: WebSocket transport, the Noise handshake, and
//! the post-handshake stateful session loop.
//!
//! `Session` is the engine's single largest component: it owns the one
//! WebSocket a connection uses, drives the Noise `XX` handshake,
//! frames and (de)crypts every node, and digests the root-level
//! stanzas (`iq`, `success`, `failure`, `stream:error`,
//! `xmlstreamend`) that drive pairing (via `PairingSession`), request
//! correlation (via `RequestTracker`), reconnect, and login state.
//! Everything else in this crate — the codec, the ciphers, the pairing
//! chain, the correlator — exists to be driven from here.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use prost::Message as ProstMessage;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::binary::{decode, encode, Node};
use crate::crypto::{Cipher, NoiseHandshake, PreKey};
use crate::error::{EngineError, HandshakeError, LoginFailure, PairingError, StreamError, TransportError};
use crate::pairing::{PairSuccessPayload, PairingSession};
use crate::proto::{
    make_device_pairing_data, make_web_client_payload, AdvSignedDeviceIdentityHmac, ClientHello,
    ClientPayload, HandshakeMessage, ServerHello,
};
use crate::request::{build_iq_get, build_iq_result, build_iq_set, RequestTracker};
use crate::store::Device;
use crate::types::{Connected, DisconnectReason, Disconnected, Event, PairSuccess, QRCode};

/// `WA\x06\x00`: the fixed four-byte intro sent once, before the
/// first handshake frame, to identify the wire dialect.
pub const WA_HEADER: &[u8] = b"WA\x06\x00";

pub mod endpoints {
    pub const MAIN: &str = "wss://web.whatsapp.com/ws/chat";
    pub const FALLBACK: &str = "wss://w1.web.whatsapp.com/ws/chat";
}

/// A length-prefix value servers use as a soft-disconnect signal
/// rather than a real frame length; seeing it means "reconnect, no
/// error to report".
pub const MAGIC_LENGTH_DISCONNECT: usize = 8_913_411;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// How often a keepalive `<iq type="get" xmlns="w:p">` ping is sent
/// once logged in.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Number of unsigned pre-keys uploaded the first time a session logs
/// in.
const PRE_KEY_BATCH_SIZE: u32 = 30;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An established connection: transport ciphers, the WebSocket, and
/// the session state (login, pairing, in-flight requests) that rides
/// on top of them.
pub struct Session {
    ws: Socket,
    send_cipher: Option<Cipher>,
    recv_cipher: Option<Cipher>,
    device: Device,
    pairing: Option<PairingSession>,
    requests: Arc<RequestTracker>,
    logged_in: bool,
    url: String,
    keepalive: Option<Interval>,
}

impl Session {
    /// Open the WebSocket and run the three-message Noise `XX`
    /// handshake, sending the client payload (with device pairing
    /// data if `device` has no JID yet) as the final message's
    /// payload.
    pub async fn connect(url: &str, device: Device) -> Result<Self, TransportError> {
        let (ws, send_cipher, recv_cipher) = Self::handshake(url, &device).await?;

        Ok(Self {
            ws,
            send_cipher: Some(send_cipher),
            recv_cipher: Some(recv_cipher),
            device,
            pairing: None,
            requests: Arc::new(RequestTracker::new()),
            logged_in: false,
            url: url.to_string(),
            keepalive: None,
        })
    }

    async fn handshake(url: &str, device: &Device) -> Result<(Socket, Cipher, Cipher), TransportError> {
        let noise_key = device
            .noise_key
            .clone()
            .ok_or(TransportError::WebSocket("device missing noise key".to_string()))?;

        let (mut ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))?;

        let mut noise = NoiseHandshake::start(noise_key, WA_HEADER);

        let msg1 = noise.write_message_1();
        let client_hello = HandshakeMessage {
            client_hello: Some(ClientHello { ephemeral: Some(msg1) }),
            server_hello: None,
            client_finish: None,
        };
        let mut msg1_bytes = Vec::new();
        client_hello
            .encode(&mut msg1_bytes)
            .expect("protobuf encoding of a well-formed message cannot fail");

        let mut frame = Vec::with_capacity(WA_HEADER.len() + 3 + msg1_bytes.len());
        frame.extend_from_slice(WA_HEADER);
        push_length_prefix(&mut frame, msg1_bytes.len());
        frame.extend_from_slice(&msg1_bytes);
        send_frame(&mut ws, &frame).await?;

        let response = recv_frame(&mut ws).await?;
        let server_hello_msg = HandshakeMessage::decode(response.as_slice())
            .map_err(|e| TransportError::WebSocket(format!("malformed handshake message: {e}")))?;
        let server_hello = server_hello_msg
            .server_hello
            .ok_or_else(|| TransportError::WebSocket("missing server_hello".to_string()))?;

        let msg2 = encode_server_hello(&server_hello)?;
        let payload = noise
            .read_message_2(&msg2)
            .map_err(TransportError::from_handshake)?;
        let _ = payload; // server's handshake payload carries a cert; not verified yet.

        let client_payload = build_client_payload(device)?;
        let mut payload_bytes = Vec::new();
        client_payload
            .encode(&mut payload_bytes)
            .expect("protobuf encoding of a well-formed message cannot fail");

        let msg3 = noise
            .write_message_3(&payload_bytes)
            .map_err(TransportError::from_handshake)?;

        let mut frame3 = Vec::new();
        push_length_prefix(&mut frame3, msg3.len());
        frame3.extend_from_slice(&msg3);
        send_frame(&mut ws, &frame3).await?;

        let (send_cipher, recv_cipher) = noise.finish();
        log::info!("noise handshake complete, transport ciphers established");

        Ok((ws, send_cipher, recv_cipher))
    }

    /// Re-establish the connection after a recoverable failure
    /// (`failure reason="401"` or `stream:error code="515"`): drop the
    /// socket and every pending request, then run the handshake again
    /// against the same device. Persisted key material is untouched —
    /// only the transport-level state (ciphers, counters, login flag)
    /// is reset.
    pub async fn reconnect(&mut self) -> Result<(), TransportError> {
        log::info!("reconnecting");
        self.logged_in = false;
        self.keepalive = None;
        self.requests.fail_all();
        let _ = self.ws.close(None).await;

        let (ws, send_cipher, recv_cipher) = Self::handshake(&self.url, &self.device).await?;
        self.ws = ws;
        self.send_cipher = Some(send_cipher);
        self.recv_cipher = Some(recv_cipher);
        Ok(())
    }

    /// Close the WebSocket and fail every pending request rather than
    /// leave callers waiting on a connection that is never coming
    /// back.
    pub async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.logged_in = false;
        self.keepalive = None;
        self.requests.fail_all();
        self.ws
            .close(None)
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn requests(&self) -> Arc<RequestTracker> {
        Arc::clone(&self.requests)
    }

    /// Send a node and wait for the reply correlated by its `id`
    /// attribute (assigned here if not already set).
    pub async fn send_request(&mut self, mut node: Node) -> Result<Node, EngineError> {
        let id = node
            .get_attr_str("id")
            .map(String::from)
            .unwrap_or_else(|| self.requests.next_id());
        node.set_attr("id", id.clone());
        self.send_node(&node).await?;
        Ok(self.requests.wait(&id).await?)
    }

    /// Encrypt and send a binary node over the transport cipher.
    pub async fn send_node(&mut self, node: &Node) -> Result<(), TransportError> {
        let plaintext = encode(node);
        let cipher = self
            .send_cipher
            .as_mut()
            .ok_or(TransportError::CipherNotEstablished)?;
        let ciphertext = cipher.encrypt(&plaintext, &[])?;

        let mut frame = Vec::with_capacity(ciphertext.len() + 3);
        push_length_prefix(&mut frame, ciphertext.len());
        frame.extend_from_slice(&ciphertext);
        send_frame(&mut self.ws, &frame).await
    }

    /// Receive, decrypt, and decode the next binary node. Returns
    /// `Ok(None)` on the soft-disconnect magic length rather than an
    /// error, so the caller can reconnect cleanly.
    pub async fn recv_node(&mut self) -> Result<Option<Node>, TransportError> {
        let frame = match self.recv_raw().await? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        let cipher = self
            .recv_cipher
            .as_mut()
            .ok_or(TransportError::CipherNotEstablished)?;
        let plaintext = cipher.decrypt(&frame, &[])?;
        let node = decode(&plaintext).map_err(|_| {
            TransportError::WebSocket("failed to decode binary node".to_string())
        })?;
        Ok(Some(node))
    }

    async fn recv_raw(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let data = recv_frame_raw(&mut self.ws).await?;
        if data.len() < 3 {
            return Err(TransportError::FrameTooShort(data.len()));
        }
        let len = ((data[0] as usize) << 16) | ((data[1] as usize) << 8) | (data[2] as usize);
        if len == MAGIC_LENGTH_DISCONNECT {
            log::debug!("received soft-disconnect length marker, treating as a clean close");
            return Ok(None);
        }
        Ok(Some(data[3..].to_vec()))
    }

    /// Receive and digest nodes until one produces a caller-visible
    /// event. Internal traffic (request replies, keepalive pings,
    /// automatic reconnects) is handled here without surfacing
    /// anything; callers should loop on this to drive the session.
    pub async fn next_event(&mut self) -> Result<Option<Event>, EngineError> {
        loop {
            let frame = if let Some(mut keepalive) = self.keepalive.take() {
                let result = tokio::select! {
                    biased;
                    _ = keepalive.tick() => {
                        self.keepalive = Some(keepalive);
                        self.send_keepalive_ping().await?;
                        continue;
                    }
                    frame = self.recv_node() => frame,
                };
                self.keepalive = Some(keepalive);
                result
            } else {
                self.recv_node().await
            };

            let node = match frame? {
                Some(node) => node,
                None => {
                    self.disconnect().await?;
                    return Ok(Some(Event::Disconnected(Disconnected {
                        reason: DisconnectReason::ServerRequested,
                    })));
                }
            };

            if let Some(event) = self.digest(node).await? {
                return Ok(Some(event));
            }
        }
    }

    async fn digest(&mut self, node: Node) -> Result<Option<Event>, EngineError> {
        match node.tag.as_str() {
            "iq" => self.digest_iq(node).await,
            "success" => self.digest_success(node).await,
            "failure" => self.digest_failure(node).await,
            "stream:error" => self.digest_stream_error(node).await,
            "xmlstreamend" => {
                self.disconnect().await?;
                Ok(Some(Event::Disconnected(Disconnected {
                    reason: DisconnectReason::ServerRequested,
                })))
            }
            _ => Ok(None),
        }
    }

    async fn digest_iq(&mut self, node: Node) -> Result<Option<Event>, EngineError> {
        if let Some(id) = node.get_attr_str("id") {
            if self.requests.complete(id, node.clone()) {
                return Ok(None);
            }
        }

        if let Some(pair_device) = node.get_child_by_tag("pair-device") {
            return self.handle_pair_device(&node, pair_device).await.map(Some);
        }

        if node.get_child_by_tag("pair-success").is_some() {
            return self.handle_pair_success(&node).await;
        }

        Ok(None)
    }

    async fn handle_pair_device(&mut self, iq: &Node, pair_device: &Node) -> Result<Event, EngineError> {
        let ref_value = pair_device
            .get_child_by_tag("ref")
            .and_then(|r| r.get_bytes())
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or(PairingError::MissingRef)?;

        let device = self.device.clone();
        let pairing = self.pairing.get_or_insert_with(|| PairingSession::new(device));
        let code = pairing.qr_code(ref_value)?;
        pairing.mark_awaiting_scan();

        if let Some(id) = iq.get_attr_str("id") {
            self.send_node(&build_iq_result(id, None)).await?;
        }

        Ok(Event::QRCode(QRCode { code, timeout_seconds: KEEPALIVE_INTERVAL.as_secs() }))
    }

    async fn handle_pair_success(&mut self, iq: &Node) -> Result<Option<Event>, EngineError> {
        let pair_success = iq
            .get_child_by_tag("pair-success")
            .ok_or(PairingError::UnexpectedState("digest_iq called without pair-success"))?
            .clone();

        let device_identity_bytes = pair_success
            .get_child_by_tag("device-identity")
            .and_then(|n| n.get_bytes())
            .ok_or(PairingError::UnexpectedState("pair-success missing device-identity"))?;
        let hmac_envelope = AdvSignedDeviceIdentityHmac::decode(device_identity_bytes)
            .map_err(|_| PairingError::UnexpectedState("malformed device-identity-hmac"))?;
        let details = hmac_envelope
            .details
            .ok_or(PairingError::UnexpectedState("device-identity-hmac missing details"))?;
        let hmac = hmac_envelope
            .hmac
            .ok_or(PairingError::UnexpectedState("device-identity-hmac missing hmac"))?;

        let pairing = self
            .pairing
            .as_mut()
            .ok_or(PairingError::UnexpectedState("pair-success with no pairing in progress"))?;

        let confirmation = match pairing.verify_and_sign(PairSuccessPayload { details: &details, hmac: &hmac }) {
            Ok(node) => node,
            Err(err) => {
                self.disconnect().await?;
                return Err(EngineError::Pairing(err));
            }
        };

        let mut reply = build_iq_result(iq.get_attr_str("id").unwrap_or_default(), None);
        reply.add_child(confirmation);
        self.send_node(&reply).await?;

        let device_jid = pair_success
            .get_child_by_tag("device")
            .and_then(|d| {
                d.get_attr_jid("jid")
                    .cloned()
                    .or_else(|| d.get_attr_str("jid").and_then(|s| s.parse().ok()))
            })
            .ok_or(PairingError::UnexpectedState("pair-success missing device jid"))?;
        let business_name = pair_success.get_attr_str("biz_name").map(String::from);
        let platform = pair_success.get_attr_str("platform").map(String::from);

        let pairing = self.pairing.as_mut().expect("checked above");
        let jid = pairing.finalize_pairing(device_jid, business_name.clone(), platform.clone());
        self.device = pairing.device().clone();

        Ok(Some(Event::PairSuccess(PairSuccess { device_jid: jid, business_name, platform })))
    }

    async fn digest_success(&mut self, _node: Node) -> Result<Option<Event>, EngineError> {
        let is_reconnect = self.logged_in;
        self.logged_in = true;

        if !self.device.pre_keys_sent {
            self.send_pre_keys().await?;
            self.device.pre_keys_sent = true;
        }

        let mut active = build_iq_set(&self.requests.next_id(), "passive", None);
        active.add_child(Node::new("active"));
        self.send_node(&active).await?;

        let mut ping_interval = interval(KEEPALIVE_INTERVAL);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.keepalive = Some(ping_interval);

        log::info!("logged in, pre-keys sent={}", self.device.pre_keys_sent);
        Ok(Some(Event::Connected(Connected { is_reconnect })))
    }

    /// Upload a fresh batch of unsigned pre-keys, once, the first time
    /// a session reaches `<success>`.
    async fn send_pre_keys(&mut self) -> Result<(), EngineError> {
        let id = self.requests.next_id();
        let node = build_pre_key_upload_node(&id, &self.device)?;
        self.send_node(&node).await?;
        Ok(())
    }

    async fn send_keepalive_ping(&mut self) -> Result<(), EngineError> {
        let id = self.requests.next_id();
        self.send_node(&build_iq_get(&id, "w:p", None)).await?;
        Ok(())
    }

    async fn digest_failure(&mut self, node: Node) -> Result<Option<Event>, EngineError> {
        let reason = node.get_attr_str("reason").and_then(|r| r.parse::<u32>().ok());
        if reason == Some(401) {
            log::warn!("failure reason=401, reconnecting");
            self.reconnect().await?;
            return Ok(None);
        }
        log::error!("fatal login failure: reason={reason:?}");
        Err(EngineError::Login(LoginFailure { reason }))
    }

    async fn digest_stream_error(&mut self, node: Node) -> Result<Option<Event>, EngineError> {
        let code = node.get_attr_str("code").and_then(|c| c.parse::<u32>().ok());
        if code == Some(515) {
            log::warn!("stream:error code=515, reconnecting");
            self.reconnect().await?;
            return Ok(None);
        }
        log::error!("fatal stream error: code={code:?}");
        self.requests.fail_all();
        Err(EngineError::Stream(StreamError { code }))
    }
}

fn push_length_prefix(buf: &mut Vec<u8>, len: usize) {
    buf.push(((len >> 16) & 0xFF) as u8);
    buf.push(((len >> 8) & 0xFF) as u8);
    buf.push((len & 0xFF) as u8);
}

async fn send_frame(ws: &mut Socket, frame: &[u8]) -> Result<(), TransportError> {
    ws.send(Message::Binary(frame.to_vec().into()))
        .await
        .map_err(|e| TransportError::WebSocket(e.to_string()))
}

async fn recv_frame(ws: &mut Socket) -> Result<Vec<u8>, TransportError> {
    recv_frame_raw(ws).await
}

async fn recv_frame_raw(ws: &mut Socket) -> Result<Vec<u8>, TransportError> {
    let msg = timeout(READ_TIMEOUT, ws.next())
        .await
        .map_err(|_| TransportError::WebSocket("read timed out".to_string()))?
        .ok_or(TransportError::NotConnected)?
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

    match msg {
        Message::Binary(data) => Ok(data.to_vec()),
        Message::Close(_) => Err(TransportError::NotConnected),
        _ => Err(TransportError::WebSocket("unexpected message type".to_string())),
    }
}

fn encode_server_hello(server_hello: &ServerHello) -> Result<Vec<u8>, TransportError> {
    let ephemeral = server_hello
        .ephemeral
        .as_ref()
        .ok_or_else(|| TransportError::WebSocket("missing server ephemeral".to_string()))?;
    let server_static = server_hello
        .r#static
        .as_ref()
        .ok_or_else(|| TransportError::WebSocket("missing server static".to_string()))?;
    let payload = server_hello
        .payload
        .as_ref()
        .ok_or_else(|| TransportError::WebSocket("missing server payload".to_string()))?;

    let mut out = Vec::with_capacity(ephemeral.len() + server_static.len() + payload.len());
    out.extend_from_slice(ephemeral);
    out.extend_from_slice(server_static);
    out.extend_from_slice(payload);
    Ok(out)
}

fn build_client_payload(device: &Device) -> Result<ClientPayload, TransportError> {
    let mut client_payload = make_web_client_payload(device.push_name.as_deref());

    if device.jid.is_none() {
        let identity_key = device
            .identity_key
            .as_ref()
            .ok_or_else(|| TransportError::WebSocket("device missing identity key".to_string()))?;
        let signed_prekey = device
            .signed_pre_key
            .as_ref()
            .ok_or_else(|| TransportError::WebSocket("device missing signed prekey".to_string()))?;
        let signature = signed_prekey.signature.unwrap_or([0u8; 64]);

        let pairing_data = make_device_pairing_data(
            device.registration_id,
            &identity_key.public,
            signed_prekey.key_id,
            &signed_prekey.key_pair.public,
            &signature,
            &[],
        );
        client_payload.device_pairing_data = Some(pairing_data);
    }

    Ok(client_payload)
}

/// Build the `<iq type="set" xmlns="encrypt">` pre-key upload carrying
/// this device's identity key, signed pre-key, and a fresh batch of
/// `PRE_KEY_BATCH_SIZE` unsigned pre-keys.
fn build_pre_key_upload_node(id: &str, device: &Device) -> Result<Node, TransportError> {
    let identity = device
        .identity_key
        .as_ref()
        .ok_or_else(|| TransportError::WebSocket("device missing identity key".to_string()))?;
    let signed_pre_key = device
        .signed_pre_key
        .as_ref()
        .ok_or_else(|| TransportError::WebSocket("device missing signed prekey".to_string()))?;

    let mut iq = build_iq_set(id, "encrypt", None);
    let mut registration = Node::new("registration");

    let mut identity_node = Node::new("identity");
    identity_node.set_bytes(identity.public.to_vec());
    registration.add_child(identity_node);

    let mut list = Node::new("list");
    for key_id in 1..=PRE_KEY_BATCH_SIZE {
        let pre_key = PreKey::new(key_id);
        let mut key_node = Node::new("key");
        let mut id_node = Node::new("id");
        id_node.set_bytes(key_id.to_be_bytes()[1..].to_vec());
        let mut value_node = Node::new("value");
        value_node.set_bytes(pre_key.key_pair.public.to_vec());
        key_node.add_child(id_node);
        key_node.add_child(value_node);
        list.add_child(key_node);
    }
    registration.add_child(list);

    let mut skey = Node::new("skey");
    let mut skey_id = Node::new("id");
    skey_id.set_bytes(signed_pre_key.key_id.to_be_bytes()[1..].to_vec());
    let mut skey_value = Node::new("value");
    skey_value.set_bytes(signed_pre_key.key_pair.public.to_vec());
    let mut skey_signature = Node::new("signature");
    skey_signature.set_bytes(signed_pre_key.signature.unwrap_or([0u8; 64]).to_vec());
    skey.add_child(skey_id);
    skey.add_child(skey_value);
    skey.add_child(skey_signature);
    registration.add_child(skey);

    iq.add_child(registration);
    Ok(iq)
}

impl TransportError {
    fn from_handshake(err: HandshakeError) -> Self {
        TransportError::WebSocket(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_length_is_not_a_plausible_frame_size() {
        // sanity check against accidental collision with a real binary
        // node length while editing this module.
        assert!(MAGIC_LENGTH_DISCONNECT > 0xFF_FFFF / 2);
    }

    #[test]
    fn test_push_length_prefix_round_trips() {
        let mut buf = Vec::new();
        push_length_prefix(&mut buf, 0x01_2345);
        assert_eq!(buf, vec![0x01, 0x23, 0x45]);
    }

    #[test]
    fn test_pre_key_upload_node_shape() {
        let mut device = Device::new();
        device.initialize();

        let node = build_pre_key_upload_node("1", &device).unwrap();
        assert_eq!(node.get_attr_str("xmlns"), Some("encrypt"));
        assert_eq!(node.get_attr_str("type"), Some("set"));

        let registration = node.get_child_by_tag("registration").unwrap();
        assert!(registration.get_child_by_tag("identity").is_some());
        assert!(registration.get_child_by_tag("skey").is_some());

        let list = registration.get_child_by_tag("list").unwrap();
        assert_eq!(list.get_children().unwrap().len(), PRE_KEY_BATCH_SIZE as usize);
    }
}
