mod builder;
mod key;
mod message;
mod shared;
mod signature;

pub use self::builder::*;
pub use self::key::*;
pub use self::message::*;
pub use self::shared::*;
pub use self::signature::*;
