use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy of this crate.
///
/// Every variant that maps to a protocol-level failure carries a short
/// context string describing where the failure was observed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed packet header: {0}")]
    MalformedHeader(String),
    #[error("truncated mpi: {0}")]
    TruncatedMpi(String),
    #[error("unknown packet tag {0}")]
    UnknownTag(u8),
    #[error("partial body length not allowed for tag {0}")]
    UnknownPartial(u8),
    #[error("bad pkcs#1 padding: {0}")]
    BadPadding(String),
    #[error("cfb quick check failed: {0}")]
    QuickCheckFailed(String),
    #[error("modification detection code mismatch: {0}")]
    MdcMismatch(String),
    #[error("session key checksum mismatch: {0}")]
    ChecksumMismatch(String),
    #[error("wrong passphrase: {0}")]
    WrongPassphrase(String),
    #[error("bad signature: {0}")]
    BadSignature(String),
    #[error("key revoked: {0}")]
    KeyRevoked(String),
    #[error("no signing key: {0}")]
    NoSigningKey(String),
    #[error("no encrypting key: {0}")]
    NoEncryptingKey(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("container shape violation: {0}")]
    ContainerShapeViolation(String),

    /// Packet body did not parse; the framing layer skips such packets.
    #[error("invalid packet content: {0}")]
    PacketError(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&'a [u8]>>) -> Error {
        match err {
            nom::Err::Incomplete(needed) => {
                Error::PacketError(format!("incomplete input: {:?}", needed))
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::PacketError(format!(
                "{:?} with {} bytes remaining",
                e.code,
                e.input.len()
            )),
        }
    }
}

#[macro_export]
macro_rules! format_err {
    ($($t:tt)*) => {
        $crate::errors::Error::Message(format!($($t)*))
    };
}

#[macro_export]
macro_rules! bail {
    ($($t:tt)*) => {
        return Err($crate::format_err!($($t)*))
    };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($t:tt)*) => {
        if !$cond {
            $crate::bail!($($t)*);
        }
    };
}

#[macro_export]
macro_rules! ensure_eq {
    ($a:expr, $b:expr) => {
        $crate::ensure_eq!($a, $b, "not equal");
    };
    ($a:expr, $b:expr, $($t:tt)*) => {{
        let (a, b) = (&$a, &$b);
        if a != b {
            $crate::bail!($($t)*);
        }
    }};
}

#[macro_export]
macro_rules! unsupported_err {
    ($($t:tt)*) => {
        return Err($crate::errors::Error::UnsupportedAlgorithm(format!($($t)*)))
    };
}
