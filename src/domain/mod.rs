//! Usage: Lightning payment features built on the wallet capability.

pub mod fiat;
pub mod lightning;
pub mod lightning_address;
pub mod scroll_payment;
