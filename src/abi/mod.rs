//! Solidity ABI bindings, generated via `alloy::sol!`.
//!
//! The decoder resolves a log's topic-0 against `ContractConfig::events`, then
//! decodes it with the matching `SolEvent` impl from this module. Only the two
//! built-in ERC-20 events get typed bindings; anything else configured in
//! `ContractConfig::abi` is decoded as `DecodedEvent::Raw` by `crate::decoder`.

pub mod erc20;

pub use erc20::{Approval, Transfer};
