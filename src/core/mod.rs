pub mod types;

pub use types::{AddressProfile, RiskTier, Transfer, ZERO_ADDRESS};
