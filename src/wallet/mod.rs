//! Usage: Wallet backends (in-page extension, custodial REST) behind one capability enum.

pub mod capability;
pub mod custodial;
pub mod extension;
pub mod types;
