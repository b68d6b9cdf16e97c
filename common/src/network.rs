pub mod range;

pub use range::{AddressBlock, Ipv4Range, NetworkParseError};
