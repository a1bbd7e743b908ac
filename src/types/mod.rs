mod compression;
mod key_id;
mod mpi;
mod packet;
mod params;
mod s2k;
mod secret_params;
mod traits;

pub use self::compression::*;
pub use self::key_id::*;
pub use self::mpi::*;
pub use self::packet::*;
pub use self::params::*;
pub use self::s2k::*;
pub use self::secret_params::*;
pub use self::traits::*;
