//! Transaction admission: nonce lifecycle and fee gating

mod fee;
mod nonce;

pub use fee::{FeeCeiling, FeeGate};
pub use nonce::NonceManager;
