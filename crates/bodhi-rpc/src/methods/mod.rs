//! RPC method implementations, one module per namespace

pub mod eth;
pub mod filter;
pub mod net;
pub mod web3;
