//! Cross-crate integration flows.

pub mod epoch_flows;
pub mod gateway_flows;
