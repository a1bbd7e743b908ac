use std::io;

use chrono::{DateTime, Utc};
use log::warn;
use rand::{CryptoRng, Rng};

use crate::composed::shared::Deserializable;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::packet::{
    write_packet, Packet, PubKeyInner, PublicKey, PublicKeyEncryptedSessionKey, PublicSubkey,
    SecretKey, SecretSubkey, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData,
    UserAttribute, UserId,
};
use crate::ser::Serialize;
use crate::types::{
    KeyId, KeyVersion, PublicKeyTrait, PublicParams, SecretKeyTrait, SecretParams,
};

/// Whether a key is usable, according to its revocation signatures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RevocationStatus {
    Revoked,
    NotRevoked,
    /// Revocation signatures exist that cannot be attributed or verified
    /// with the material at hand.
    Undetermined,
}

/// A User ID packet with its certification signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUser {
    pub id: UserId,
    pub signatures: Vec<Signature>,
}

/// A User Attribute packet with its certification signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUserAttribute {
    pub attr: UserAttribute,
    pub signatures: Vec<Signature>,
}

/// A public subkey with its binding signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublicSubKey {
    pub key: PublicSubkey,
    pub signatures: Vec<Signature>,
}

/// A secret subkey with its binding signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSecretSubKey {
    pub key: SecretSubkey,
    pub signatures: Vec<Signature>,
}

/// A transferable public key: primary key, bindings and certifications.
/// Ref: https://tools.ietf.org/html/rfc4880#section-11.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPublicKey {
    pub primary_key: PublicKey,
    pub revocation_signatures: Vec<Signature>,
    pub direct_signatures: Vec<Signature>,
    pub users: Vec<SignedUser>,
    pub user_attributes: Vec<SignedUserAttribute>,
    pub public_subkeys: Vec<SignedPublicSubKey>,
}

/// A transferable secret key.
/// Ref: https://tools.ietf.org/html/rfc4880#section-11.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSecretKey {
    pub primary_key: SecretKey,
    pub revocation_signatures: Vec<Signature>,
    pub direct_signatures: Vec<Signature>,
    pub users: Vec<SignedUser>,
    pub user_attributes: Vec<SignedUserAttribute>,
    pub secret_subkeys: Vec<SignedSecretSubKey>,
}

/// Generates `Deserializable` for the two transferable key shapes; they
/// differ only in the primary and subkey packet tags.
macro_rules! key_parser {
    ($key_type:ident, $primary:ident, $subkey_variant:ident, $signed_subkey:ident, $subkeys_field:ident) => {
        impl Deserializable for $key_type {
            fn from_packets(packets: impl IntoIterator<Item = Packet>) -> Result<Vec<Self>> {
                let mut iter = packets.into_iter().peekable();
                let mut keys = Vec::new();

                while iter.peek().is_some() {
                    keys.push(Self::from_packets_single(&mut iter)?);
                }

                Ok(keys)
            }
        }

        impl $key_type {
            /// Parses a single transferable key off the front of a packet
            /// stream.
            fn from_packets_single(
                packets: &mut std::iter::Peekable<impl Iterator<Item = Packet>>,
            ) -> Result<Self> {
                // -- One primary key packet
                let primary_key = match packets.next() {
                    Some(Packet::$primary(key)) => key,
                    Some(other) => {
                        return Err(Error::ContainerShapeViolation(format!(
                            "expected a primary key packet, found tag {}",
                            other.tag()
                        )))
                    }
                    None => {
                        return Err(Error::ContainerShapeViolation(
                            "missing primary key packet".into(),
                        ))
                    }
                };

                // -- Zero or more revocation signatures
                // -- followed by zero or more direct signatures in V4 keys
                let mut revocation_signatures = Vec::new();
                let mut direct_signatures = Vec::new();

                while matches!(packets.peek(), Some(Packet::Signature(_))) {
                    let Some(Packet::Signature(sig)) = packets.next() else {
                        unreachable!("peeked");
                    };
                    if sig.typ() == SignatureType::KeyRevocation {
                        revocation_signatures.push(sig);
                    } else {
                        if primary_key.key_version() != KeyVersion::V4 {
                            warn!("unexpected signature {:?} on a v3 key", sig.typ());
                        }
                        direct_signatures.push(sig);
                    }
                }

                // -- Zero or more User ID / User Attribute packets, each
                //    followed by its certifications
                let mut users = Vec::new();
                let mut user_attributes = Vec::new();

                loop {
                    match packets.peek() {
                        Some(Packet::UserId(_)) => {
                            let Some(Packet::UserId(id)) = packets.next() else {
                                unreachable!("peeked");
                            };
                            users.push(SignedUser {
                                id,
                                signatures: take_signatures(packets),
                            });
                        }
                        Some(Packet::UserAttribute(_)) => {
                            let Some(Packet::UserAttribute(attr)) = packets.next() else {
                                unreachable!("peeked");
                            };
                            user_attributes.push(SignedUserAttribute {
                                attr,
                                signatures: take_signatures(packets),
                            });
                        }
                        _ => break,
                    }
                }

                if users.is_empty() && user_attributes.is_empty() {
                    return Err(Error::ContainerShapeViolation(
                        "a transferable key carries at least one user id".into(),
                    ));
                }

                // -- Zero or more subkeys with their binding signatures
                let mut $subkeys_field = Vec::new();
                while matches!(packets.peek(), Some(Packet::$subkey_variant(_))) {
                    let Some(Packet::$subkey_variant(key)) = packets.next() else {
                        unreachable!("peeked");
                    };
                    let signatures = take_signatures(packets);
                    if signatures.is_empty() {
                        return Err(Error::ContainerShapeViolation(
                            "subkey without a binding signature".into(),
                        ));
                    }
                    $subkeys_field.push($signed_subkey { key, signatures });
                }

                // anything else starts the next key (or is misplaced)
                if let Some(next) = packets.peek() {
                    if !matches!(next, Packet::$primary(_)) {
                        return Err(Error::ContainerShapeViolation(format!(
                            "unexpected packet tag {} after a transferable key",
                            next.tag()
                        )));
                    }
                }

                Ok($key_type {
                    primary_key,
                    revocation_signatures,
                    direct_signatures,
                    users,
                    user_attributes,
                    $subkeys_field,
                })
            }

            pub fn key_id(&self) -> Result<KeyId> {
                self.primary_key.key_id()
            }

            pub fn fingerprint(&self) -> Result<Vec<u8>> {
                self.primary_key.fingerprint()
            }

            /// Walks the revocation signatures of the primary key.
            ///
            /// A revocation verified against the primary key itself revokes
            /// it; revocations by a designated revoker whose key is absent
            /// leave the question open.
            pub fn revocation_status(&self) -> Result<RevocationStatus> {
                let own_id = self.primary_key.key_id()?;
                let mut undetermined = false;

                for sig in &self.revocation_signatures {
                    match sig.issuer() {
                        Some(issuer) if *issuer == own_id => {
                            match sig.verify_key(&self.primary_key, &self.primary_key) {
                                Ok(()) => return Ok(RevocationStatus::Revoked),
                                Err(Error::BadSignature(err)) => {
                                    warn!("ignoring bad revocation signature: {}", err);
                                }
                                Err(err) => return Err(err),
                            }
                        }
                        _ => undetermined = true,
                    }
                }

                if undetermined {
                    Ok(RevocationStatus::Undetermined)
                } else {
                    Ok(RevocationStatus::NotRevoked)
                }
            }

            /// Verifies the self-certifications and binding signatures this
            /// key carries.
            pub fn verify(&self) -> Result<()> {
                let own_id = self.primary_key.key_id()?;

                for user in &self.users {
                    for sig in &user.signatures {
                        if sig.issuer() != Some(&own_id) {
                            continue;
                        }
                        sig.verify_certification(&self.primary_key, &self.primary_key, &user.id)?;
                    }
                }

                for attr in &self.user_attributes {
                    for sig in &attr.signatures {
                        if sig.issuer() != Some(&own_id) {
                            continue;
                        }
                        sig.verify_attribute_certification(
                            &self.primary_key,
                            &self.primary_key,
                            &attr.attr,
                        )?;
                    }
                }

                for subkey in &self.$subkeys_field {
                    for sig in &subkey.signatures {
                        match sig.typ() {
                            SignatureType::SubkeyBinding | SignatureType::SubkeyRevocation => {
                                sig.verify_binding(
                                    &self.primary_key,
                                    &self.primary_key,
                                    &subkey.key,
                                )?;
                            }
                            other => {
                                warn!("skipping unexpected subkey signature {:?}", other);
                            }
                        }
                    }
                }

                Ok(())
            }

            /// Whether `id` names the primary key or one of the subkeys.
            pub fn has_key_id(&self, id: &KeyId) -> Result<bool> {
                if self.primary_key.key_id()? == *id {
                    return Ok(true);
                }
                for subkey in &self.$subkeys_field {
                    if subkey.key.key_id()? == *id {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }

        impl PublicKeyTrait for $key_type {
            fn key_version(&self) -> KeyVersion {
                self.primary_key.key_version()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.primary_key.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.primary_key.created_at()
            }

            fn expiration(&self) -> Option<u16> {
                self.primary_key.expiration()
            }

            fn public_params(&self) -> &PublicParams {
                self.primary_key.public_params()
            }
        }

        impl Serialize for $key_type {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                write_packet(writer, &self.primary_key)?;
                for sig in &self.revocation_signatures {
                    write_packet(writer, sig)?;
                }
                for sig in &self.direct_signatures {
                    write_packet(writer, sig)?;
                }
                for user in &self.users {
                    write_packet(writer, &user.id)?;
                    for sig in &user.signatures {
                        write_packet(writer, sig)?;
                    }
                }
                for attr in &self.user_attributes {
                    write_packet(writer, &attr.attr)?;
                    for sig in &attr.signatures {
                        write_packet(writer, sig)?;
                    }
                }
                for subkey in &self.$subkeys_field {
                    write_packet(writer, &subkey.key)?;
                    for sig in &subkey.signatures {
                        write_packet(writer, sig)?;
                    }
                }

                Ok(())
            }
        }
    };
}

key_parser!(
    SignedPublicKey,
    PublicKey,
    PublicSubkey,
    SignedPublicSubKey,
    public_subkeys
);
key_parser!(
    SignedSecretKey,
    SecretKey,
    SecretSubkey,
    SignedSecretSubKey,
    secret_subkeys
);

fn take_signatures(
    packets: &mut std::iter::Peekable<impl Iterator<Item = Packet>>,
) -> Vec<Signature> {
    let mut sigs = Vec::new();
    while matches!(packets.peek(), Some(Packet::Signature(_))) {
        if let Some(Packet::Signature(sig)) = packets.next() {
            sigs.push(sig);
        }
    }
    sigs
}

impl SignedPublicKey {
    /// Selects the key to encrypt to: the primary key when its algorithm
    /// encrypts, otherwise the first usable encryption subkey. Revoked
    /// keys are refused.
    pub fn encryption_key(&self) -> Result<&PubKeyInner> {
        if self.revocation_status()? == RevocationStatus::Revoked {
            return Err(Error::KeyRevoked(format!("key {}", self.key_id()?)));
        }

        if self.primary_key.algorithm().can_encrypt() {
            return Ok(self.primary_key.inner());
        }

        for subkey in &self.public_subkeys {
            if !subkey.key.algorithm().can_encrypt() {
                continue;
            }
            if self.subkey_revoked(&subkey.signatures, &subkey.key)? {
                warn!("skipping revoked subkey {}", subkey.key.key_id()?);
                continue;
            }
            return Ok(subkey.key.inner());
        }

        Err(Error::NoEncryptingKey(format!("key {}", self.key_id()?)))
    }

    fn subkey_revoked(
        &self,
        signatures: &[Signature],
        subkey: &impl PublicKeyTrait,
    ) -> Result<bool> {
        for sig in signatures {
            if sig.typ() != SignatureType::SubkeyRevocation {
                continue;
            }
            match sig.verify_binding(&self.primary_key, &self.primary_key, subkey) {
                Ok(()) => return Ok(true),
                Err(Error::BadSignature(err)) => {
                    warn!("ignoring bad subkey revocation: {}", err);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(false)
    }

    /// Splices a revocation signature into the container.
    pub fn with_revocation(mut self, sig: Signature) -> Self {
        self.revocation_signatures.push(sig);
        self
    }
}

/// A borrowed signing-capable secret key: the primary key or a subkey.
#[derive(Debug, Clone, Copy)]
pub enum SigningKeyRef<'a> {
    Primary(&'a SecretKey),
    Subkey(&'a SecretSubkey),
}

impl PublicKeyTrait for SigningKeyRef<'_> {
    fn key_version(&self) -> KeyVersion {
        match self {
            SigningKeyRef::Primary(k) => k.key_version(),
            SigningKeyRef::Subkey(k) => k.key_version(),
        }
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        match self {
            SigningKeyRef::Primary(k) => k.algorithm(),
            SigningKeyRef::Subkey(k) => k.algorithm(),
        }
    }

    fn created_at(&self) -> &DateTime<Utc> {
        match self {
            SigningKeyRef::Primary(k) => k.created_at(),
            SigningKeyRef::Subkey(k) => k.created_at(),
        }
    }

    fn expiration(&self) -> Option<u16> {
        match self {
            SigningKeyRef::Primary(k) => k.expiration(),
            SigningKeyRef::Subkey(k) => k.expiration(),
        }
    }

    fn public_params(&self) -> &PublicParams {
        match self {
            SigningKeyRef::Primary(k) => k.public_params(),
            SigningKeyRef::Subkey(k) => k.public_params(),
        }
    }
}

impl SecretKeyTrait for SigningKeyRef<'_> {
    fn secret_params(&self) -> &SecretParams {
        match self {
            SigningKeyRef::Primary(k) => k.secret_params(),
            SigningKeyRef::Subkey(k) => k.secret_params(),
        }
    }
}

impl SignedSecretKey {
    /// Selects the signing key: the primary key when its algorithm signs,
    /// otherwise the first signing-capable subkey. Revoked keys are
    /// refused.
    pub fn signing_key(&self) -> Result<SigningKeyRef<'_>> {
        if self.revocation_status()? == RevocationStatus::Revoked {
            return Err(Error::KeyRevoked(format!("key {}", self.key_id()?)));
        }

        if self.primary_key.algorithm().can_sign() {
            return Ok(SigningKeyRef::Primary(&self.primary_key));
        }

        for subkey in &self.secret_subkeys {
            if subkey.key.algorithm().can_sign() {
                return Ok(SigningKeyRef::Subkey(&subkey.key));
            }
        }

        Err(Error::NoSigningKey(format!("key {}", self.key_id()?)))
    }

    /// Tries to unwrap the session key of `pkesk` with the primary key or
    /// any subkey whose id matches. A wildcard id tries them all.
    pub(crate) fn decrypt_session_key_matching(
        &self,
        passphrase: &str,
        pkesk: &PublicKeyEncryptedSessionKey,
    ) -> Result<Option<Vec<u8>>> {
        let wanted = pkesk.id();

        if wanted.is_wildcard() {
            if let Ok(payload) = self
                .primary_key
                .decrypt_session_key(passphrase, pkesk.mpis())
            {
                return Ok(Some(payload));
            }
            for subkey in &self.secret_subkeys {
                if let Ok(payload) = subkey.key.decrypt_session_key(passphrase, pkesk.mpis()) {
                    return Ok(Some(payload));
                }
            }
            return Ok(None);
        }

        if self.primary_key.key_id()? == *wanted {
            return self
                .primary_key
                .decrypt_session_key(passphrase, pkesk.mpis())
                .map(Some);
        }
        for subkey in &self.secret_subkeys {
            if subkey.key.key_id()? == *wanted {
                return subkey
                    .key
                    .decrypt_session_key(passphrase, pkesk.mpis())
                    .map(Some);
            }
        }

        Ok(None)
    }

    /// The public half of this key, certifications included.
    pub fn public_key(&self) -> SignedPublicKey {
        SignedPublicKey {
            primary_key: self.primary_key.public_key(),
            revocation_signatures: self.revocation_signatures.clone(),
            direct_signatures: self.direct_signatures.clone(),
            users: self.users.clone(),
            user_attributes: self.user_attributes.clone(),
            public_subkeys: self
                .secret_subkeys
                .iter()
                .map(|subkey| SignedPublicSubKey {
                    key: subkey.key.public_key(),
                    signatures: subkey.signatures.clone(),
                })
                .collect(),
        }
    }

    /// Issues a key revocation signature (type 0x20) over the primary key.
    pub fn create_revocation<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        passphrase: &str,
        code: u8,
        reason: &str,
    ) -> Result<Signature> {
        let mut config = SignatureConfig::v4_for_key(
            SignatureType::KeyRevocation,
            HashAlgorithm::SHA256,
            &self.primary_key,
        )?;
        config
            .hashed_subpackets
            .push(Subpacket::regular(SubpacketData::RevocationReason(
                code,
                reason.into(),
            )));

        config.sign_key(rng, &self.primary_key, passphrase, &self.primary_key)
    }

    /// Re-encrypts all secret material under a new passphrase (`None`
    /// stores it in the clear).
    pub fn change_passphrase<R: CryptoRng + Rng>(
        &self,
        rng: &mut R,
        old: &str,
        new: Option<&str>,
    ) -> Result<SignedSecretKey> {
        let primary_key = self.primary_key.set_passphrase(rng, old, new)?;
        let mut secret_subkeys = Vec::with_capacity(self.secret_subkeys.len());
        for subkey in &self.secret_subkeys {
            secret_subkeys.push(SignedSecretSubKey {
                key: subkey.key.set_passphrase(rng, old, new)?,
                signatures: subkey.signatures.clone(),
            });
        }

        Ok(SignedSecretKey {
            primary_key,
            revocation_signatures: self.revocation_signatures.clone(),
            direct_signatures: self.direct_signatures.clone(),
            users: self.users.clone(),
            user_attributes: self.user_attributes.clone(),
            secret_subkeys,
        })
    }
}
