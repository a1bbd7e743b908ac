//! An implementation of the OpenPGP message format of RFC 4880: the
//! binary packet codec and the message, signature and key pipelines built
//! on top of it.
//!
//! ASCII armor, keyring storage and the command line surface live outside
//! this crate; everything here transforms in-memory bytes.

pub mod errors;

pub mod composed;
pub mod crypto;
pub mod packet;
pub mod ser;
pub mod types;
pub mod util;

pub use crate::composed::{
    generate_rsa_key, CleartextSignedMessage, Deserializable, Edata, Esk, Message,
    RevocationStatus, SignedPublicKey, SignedSecretKey, StandaloneSignature,
};
pub use crate::errors::{Error, Result};
pub use crate::ser::Serialize;
