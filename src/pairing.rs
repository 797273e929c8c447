//! QR/pairing-code device-linking state machine.
//!
//! Mirrors the flow the WhatsApp Web client drives the phone through:
//! display a rotating QR code (or a phone-entry pairing code) carrying
//! the device's public keys, wait for the phone to scan it and send
//! back a signed ADV identity, verify that signature chain, sign our
//! own half of it, and only then consider the device paired.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use prost::Message as ProstMessage;
use qrcode::{render::unicode, QrCode};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::binary::Node;
use crate::crypto::{verify_message, KeyPair};
use crate::error::PairingError;
use crate::proto::{AdvDeviceIdentity, AdvSignedDeviceIdentity};
use crate::store::Device;
use crate::types::JID;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation prefixes for the two signatures in the ADV chain:
/// the phone's account signature over `details2` (`0x06 0x00`), and
/// this device's signature over `details2 || accountSignature`
/// (`0x06 0x01`). Reusing one prefix for both would let a signature
/// meant for one purpose be replayed as the other.
const ADV_ACCOUNT_SIGNATURE_PREFIX: [u8; 2] = [0x06, 0x00];
const ADV_DEVICE_SIGNATURE_PREFIX: [u8; 2] = [0x06, 0x01];

/// Where a pairing attempt currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingState {
    UnpairedIdle,
    AwaitingPairDevice,
    QrDisplayed { code: String, ref_value: String },
    AwaitingPairSuccess,
    Verifying,
    Paired,
    PairingFailed(String),
}

/// The raw `<device-identity>` payload carried in a `<pair-success>`
/// node: the encoded `AdvSignedDeviceIdentityHmac` split into its two
/// fields.
pub struct PairSuccessPayload<'a> {
    pub details: &'a [u8],
    pub hmac: &'a [u8],
}

/// Drives one pairing attempt for a single `Device`.
pub struct PairingSession {
    device: Device,
    state: PairingState,
}

impl PairingSession {
    pub fn new(device: Device) -> Self {
        Self { device, state: PairingState::UnpairedIdle }
    }

    pub fn state(&self) -> &PairingState {
        &self.state
    }

    /// Build the QR text for the given server `ref`. Format:
    /// `ref,noisePublicKey,identityPublicKey,advSigningPublicKey`,
    /// each key base64-encoded, matching the four-field layout the
    /// phone app's scanner expects.
    pub fn qr_code(&mut self, ref_value: impl Into<String>) -> Result<String, PairingError> {
        let ref_value = ref_value.into();
        let noise_pub = self
            .device
            .noise_key
            .as_ref()
            .ok_or(PairingError::UnexpectedState("missing noise key"))?;
        let identity_pub = self
            .device
            .identity_key
            .as_ref()
            .ok_or(PairingError::UnexpectedState("missing identity key"))?;

        let code = format!(
            "{},{},{},{}",
            ref_value,
            BASE64.encode(noise_pub.public),
            BASE64.encode(identity_pub.public),
            BASE64.encode(identity_pub.signing_public()),
        );

        self.state = PairingState::QrDisplayed { code: code.clone(), ref_value };
        Ok(code)
    }

    /// The server sent a fresh `ref` before the old QR expired; swap
    /// in a new code without losing the `AwaitingPairDevice` intent.
    pub fn rotate_ref(&mut self, ref_value: impl Into<String>) -> Result<String, PairingError> {
        self.qr_code(ref_value)
    }

    pub fn mark_awaiting_scan(&mut self) {
        self.state = PairingState::AwaitingPairDevice;
    }

    pub fn mark_awaiting_success(&mut self) {
        self.state = PairingState::AwaitingPairSuccess;
    }

    /// Verify a `<pair-success>` payload and build the `pair-device-sign`
    /// confirmation node to send back.
    ///
    /// 1. HMAC `details` (the encoded `AdvSignedDeviceIdentity`) under
    ///    the companion key; reject on mismatch.
    /// 2. Decode `details` to get `details2`, the phone's
    ///    `accountSignatureKey`, and its `accountSignature`.
    /// 3. Verify `accountSignature` over `0x06 0x00 || details2 ||
    ///    identityPub` (this device's own identity key, not the
    ///    phone's signing key — that's only the verification key).
    /// 4. Sign `0x06 0x01 || details2 || identityPub ||
    ///    accountSignature` with this device's identity key.
    /// 5. Re-encode `AdvSignedDeviceIdentity` with `accountSignature`
    ///    cleared and `deviceSignature` filled, wrap it in a
    ///    `pair-device-sign` node carrying the `key-index` extracted
    ///    from `details2`.
    ///
    /// Any failure is fatal; there is no retry. Pairing only becomes
    /// `Paired` once `finalize_pairing` processes the server's ack.
    pub fn verify_and_sign(&mut self, payload: PairSuccessPayload<'_>) -> Result<Node, PairingError> {
        self.state = PairingState::Verifying;

        let companion_key = self
            .device
            .companion_key
            .as_ref()
            .ok_or(PairingError::UnexpectedState("missing companion key"))?;

        let mut mac = HmacSha256::new_from_slice(companion_key).expect("HMAC accepts any key length");
        mac.update(payload.details);
        let expected_hmac = mac.finalize().into_bytes();

        if expected_hmac.as_slice().ct_eq(payload.hmac).unwrap_u8() != 1 {
            self.state = PairingState::PairingFailed("hmac mismatch".to_string());
            return Err(PairingError::HmacMismatch);
        }

        let identity = AdvSignedDeviceIdentity::decode(payload.details)
            .map_err(|_| PairingError::UnexpectedState("malformed device identity"))?;
        let details2 = identity
            .details
            .ok_or(PairingError::UnexpectedState("device identity missing details"))?;
        let account_signature_key: [u8; 32] = identity
            .account_signature_key
            .as_deref()
            .and_then(|b| b.try_into().ok())
            .ok_or(PairingError::UnexpectedState("device identity missing account signature key"))?;
        let account_signature: [u8; 64] = identity
            .account_signature
            .as_deref()
            .and_then(|b| b.try_into().ok())
            .ok_or(PairingError::UnexpectedState("device identity missing account signature"))?;

        let identity_key = self
            .device
            .identity_key
            .as_ref()
            .ok_or(PairingError::UnexpectedState("missing identity key"))?;

        let mut account_message = Vec::with_capacity(2 + details2.len() + 32);
        account_message.extend_from_slice(&ADV_ACCOUNT_SIGNATURE_PREFIX);
        account_message.extend_from_slice(&details2);
        account_message.extend_from_slice(&identity_key.public);

        if !verify_message(&account_signature_key, &account_message, &account_signature) {
            self.state = PairingState::PairingFailed("account signature invalid".to_string());
            return Err(PairingError::AccountSignatureInvalid);
        }

        let device_signature = self.sign_adv_details(&details2, &account_signature)?;

        let key_index = AdvDeviceIdentity::decode(details2.as_slice())
            .ok()
            .and_then(|identity| identity.key_index)
            .unwrap_or(0);

        let confirmation = AdvSignedDeviceIdentity {
            details: Some(details2),
            account_signature_key: identity.account_signature_key,
            account_signature: None,
            device_signature: Some(device_signature.to_vec()),
        };
        let mut confirmation_bytes = Vec::new();
        confirmation
            .encode(&mut confirmation_bytes)
            .expect("protobuf encoding of a well-formed message cannot fail");

        let mut device_identity_node = Node::new("device-identity");
        device_identity_node.set_attr("key-index", key_index.to_string());
        device_identity_node.set_bytes(confirmation_bytes);

        let mut pair_device_sign = Node::new("pair-device-sign");
        pair_device_sign.add_child(device_identity_node);

        self.state = PairingState::AwaitingPairSuccess;
        Ok(pair_device_sign)
    }

    /// Sign `details2` for the device-signature half of the ADV chain:
    /// `0x06 0x01 || details2 || identityPub || accountSignature`. The
    /// `0x01` tag and the appended account signature are what separate
    /// this from the account-signature check above; without them a
    /// signature computed for one purpose would verify for the other.
    pub fn sign_adv_details(&self, details2: &[u8], account_signature: &[u8; 64]) -> Result<[u8; 64], PairingError> {
        let identity = self
            .device
            .identity_key
            .as_ref()
            .ok_or(PairingError::UnexpectedState("missing identity key"))?;

        let mut message = Vec::with_capacity(2 + details2.len() + 32 + 64);
        message.extend_from_slice(&ADV_DEVICE_SIGNATURE_PREFIX);
        message.extend_from_slice(details2);
        message.extend_from_slice(&identity.public);
        message.extend_from_slice(account_signature);

        Ok(identity.sign_message(&message))
    }

    /// Process the server's ack for a confirmed pairing: persist the
    /// companion's JID and profile fields, and transition to `Paired`.
    pub fn finalize_pairing(
        &mut self,
        device_jid: JID,
        business_name: Option<String>,
        platform: Option<String>,
    ) -> JID {
        self.device.jid = Some(device_jid.clone());
        self.device.business_name = business_name;
        self.device.platform = platform.unwrap_or_default();
        self.state = PairingState::Paired;
        device_jid
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn into_device(self) -> Device {
        self.device
    }

    /// Render the current QR code as ASCII art for terminal display.
    pub fn render_ascii(&self) -> Result<String, PairingError> {
        let code = match &self.state {
            PairingState::QrDisplayed { code, .. } => code,
            _ => return Err(PairingError::UnexpectedState("no QR code to render")),
        };

        let qr = QrCode::new(code.as_bytes())
            .map_err(|_| PairingError::UnexpectedState("qr encoding failed"))?;
        Ok(qr
            .render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .build())
    }
}

/// Build the HMAC used to authenticate an ADV identity blob for the
/// companion-key verification step, exposed for tests and for servers
/// constructing test fixtures.
pub fn compute_adv_hmac(companion_key: &[u8], details: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(companion_key).expect("HMAC accepts any key length");
    mac.update(details);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_paired_device() -> Device {
        let mut device = Device::new();
        device.initialize();
        device
    }

    /// Build an encoded `AdvSignedDeviceIdentity` (the `details` blob
    /// of a `<pair-success>`'s `device-identity`) whose account
    /// signature verifies against `device_identity_pub`.
    fn build_signed_identity(details2: Vec<u8>, signer: &KeyPair, device_identity_pub: &[u8; 32]) -> Vec<u8> {
        let account_signature_key = signer.signing_public();
        let mut message = Vec::new();
        message.extend_from_slice(&ADV_ACCOUNT_SIGNATURE_PREFIX);
        message.extend_from_slice(&details2);
        message.extend_from_slice(device_identity_pub);
        let account_signature = signer.sign_message(&message);

        let identity = AdvSignedDeviceIdentity {
            details: Some(details2),
            account_signature_key: Some(account_signature_key.to_vec()),
            account_signature: Some(account_signature.to_vec()),
            device_signature: None,
        };
        let mut bytes = Vec::new();
        identity.encode(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_qr_code_contains_ref_and_keys() {
        let device = fresh_paired_device();
        let mut session = PairingSession::new(device);
        let code = session.qr_code("abc-ref").unwrap();
        assert!(code.starts_with("abc-ref,"));
        assert_eq!(code.split(',').count(), 4);
        assert_eq!(*session.state(), PairingState::QrDisplayed {
            code: code.clone(),
            ref_value: "abc-ref".to_string(),
        });
    }

    #[test]
    fn test_successful_pairing_builds_confirmation_with_cleared_account_signature() {
        let device = fresh_paired_device();
        let companion_key = device.companion_key.clone().unwrap();
        let identity_pub = device.identity_key.as_ref().unwrap().public;
        let mut session = PairingSession::new(device);

        let signer = KeyPair::generate();
        let details = build_signed_identity(b"adv-device-identity-details2".to_vec(), &signer, &identity_pub);
        let hmac = compute_adv_hmac(&companion_key, &details);

        let confirmation = session
            .verify_and_sign(PairSuccessPayload { details: &details, hmac: &hmac })
            .unwrap();

        assert_eq!(*session.state(), PairingState::AwaitingPairSuccess);
        assert_eq!(confirmation.tag, "pair-device-sign");

        let identity_node = confirmation.get_child_by_tag("device-identity").unwrap();
        let reply = AdvSignedDeviceIdentity::decode(identity_node.get_bytes().unwrap()).unwrap();
        assert!(reply.account_signature.is_none());
        assert!(reply.device_signature.is_some());

        let jid = session.finalize_pairing(
            JID::new("123456789", crate::types::servers::DEFAULT_USER),
            None,
            Some("web".to_string()),
        );
        assert_eq!(jid.user, "123456789");
        assert_eq!(*session.state(), PairingState::Paired);
    }

    #[test]
    fn test_key_index_extracted_from_details2() {
        let device = fresh_paired_device();
        let companion_key = device.companion_key.clone().unwrap();
        let identity_pub = device.identity_key.as_ref().unwrap().public;
        let mut session = PairingSession::new(device);

        let mut details2 = Vec::new();
        AdvDeviceIdentity { raw_id: Some(7), timestamp: None, key_index: Some(5) }
            .encode(&mut details2)
            .unwrap();

        let signer = KeyPair::generate();
        let details = build_signed_identity(details2, &signer, &identity_pub);
        let hmac = compute_adv_hmac(&companion_key, &details);

        let confirmation = session
            .verify_and_sign(PairSuccessPayload { details: &details, hmac: &hmac })
            .unwrap();
        let identity_node = confirmation.get_child_by_tag("device-identity").unwrap();
        assert_eq!(identity_node.get_attr_str("key-index"), Some("5"));
    }

    #[test]
    fn test_tampered_details_rejected_by_hmac() {
        let device = fresh_paired_device();
        let companion_key = device.companion_key.clone().unwrap();
        let identity_pub = device.identity_key.as_ref().unwrap().public;
        let mut session = PairingSession::new(device);

        let signer = KeyPair::generate();
        let details = build_signed_identity(b"adv-device-identity-details2".to_vec(), &signer, &identity_pub);
        let hmac = compute_adv_hmac(&companion_key, b"different-details");

        let result = session.verify_and_sign(PairSuccessPayload { details: &details, hmac: &hmac });

        assert_eq!(result.unwrap_err(), PairingError::HmacMismatch);
        assert!(matches!(session.state(), PairingState::PairingFailed(_)));
    }

    #[test]
    fn test_tampered_account_signature_rejected() {
        let device = fresh_paired_device();
        let companion_key = device.companion_key.clone().unwrap();
        let identity_pub = device.identity_key.as_ref().unwrap().public;
        let mut session = PairingSession::new(device);

        let signer = KeyPair::generate();
        let mut details = build_signed_identity(b"adv-device-identity-details2".to_vec(), &signer, &identity_pub);
        let last = details.len() - 1;
        details[last] ^= 0xFF;
        let hmac = compute_adv_hmac(&companion_key, &details);

        let result = session.verify_and_sign(PairSuccessPayload { details: &details, hmac: &hmac });
        assert_eq!(result.unwrap_err(), PairingError::AccountSignatureInvalid);
    }

    #[test]
    fn test_render_ascii_requires_displayed_code() {
        let device = fresh_paired_device();
        let mut session = PairingSession::new(device);
        assert!(session.render_ascii().is_err());

        session.qr_code("r1").unwrap();
        assert!(session.render_ascii().is_ok());
    }

    #[test]
    fn test_sign_adv_details_round_trips_with_verify_message() {
        let device = fresh_paired_device();
        let session = PairingSession::new(device);
        let details2 = b"our own adv details2";
        let account_signature = [0x42u8; 64];

        let signature = session.sign_adv_details(details2, &account_signature).unwrap();

        let identity = session.device().identity_key.as_ref().unwrap();
        let mut message = Vec::new();
        message.extend_from_slice(&ADV_DEVICE_SIGNATURE_PREFIX);
        message.extend_from_slice(details2);
        message.extend_from_slice(&identity.public);
        message.extend_from_slice(&account_signature);

        assert!(verify_message(&identity.signing_public(), &message, &signature));
    }
}
