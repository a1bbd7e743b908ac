use std::io;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::ser::Serialize;
use crate::types::{read_mpi, Mpi};

/// The public parameters of a key, one layout per algorithm.
///
/// ECDH and ECDSA keys are recognized but carried opaquely; no crypto is
/// offered for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParams {
    RSA {
        n: Mpi,
        e: Mpi,
    },
    DSA {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    /// Raw parameter bytes of algorithms outside the RFC 4880 crypto set.
    Unknown {
        data: Vec<u8>,
    },
}

impl PublicParams {
    /// Parses the public parameters of `alg` off the front of `input`.
    pub fn from_slice(alg: PublicKeyAlgorithm, input: &[u8]) -> Result<(&[u8], Self)> {
        match alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                let (rest, n) = read_mpi(input)?;
                let (rest, e) = read_mpi(rest)?;
                Ok((rest, PublicParams::RSA { n, e }))
            }
            PublicKeyAlgorithm::DSA => {
                let (rest, p) = read_mpi(input)?;
                let (rest, q) = read_mpi(rest)?;
                let (rest, g) = read_mpi(rest)?;
                let (rest, y) = read_mpi(rest)?;
                Ok((rest, PublicParams::DSA { p, q, g, y }))
            }
            PublicKeyAlgorithm::Elgamal => {
                let (rest, p) = read_mpi(input)?;
                let (rest, g) = read_mpi(rest)?;
                let (rest, y) = read_mpi(rest)?;
                Ok((rest, PublicParams::Elgamal { p, g, y }))
            }
            PublicKeyAlgorithm::ECDH | PublicKeyAlgorithm::ECDSA => Ok((
                &[][..],
                PublicParams::Unknown {
                    data: input.to_vec(),
                },
            )),
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::RSA { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::DSA { p, q, g, y } => {
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Unknown { data } => {
                writer.write_all(data)?;
            }
        }

        Ok(())
    }
}
