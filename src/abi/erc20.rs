//! ABI bindings for the built-in ERC-20 events.
//!
//! Every contract the core decodes is expected to emit logs matching one of
//! these two canonical signatures, or to fall through to `DecodedEvent::Raw`
//! for anything else the operator has configured via `ContractConfig::abi`.

use alloy::sol;

sol! {
    /// Standard ERC-20 transfer event.
    ///
    /// `from` is the zero address for mints, `to` is the zero address for
    /// burns; no other address has special meaning to the decoder.
    #[derive(Debug, PartialEq, Eq)]
    event Transfer(
        address indexed from,
        address indexed to,
        uint256 value
    );

    /// Standard ERC-20 approval event.
    #[derive(Debug, PartialEq, Eq)]
    event Approval(
        address indexed owner,
        address indexed spender,
        uint256 value
    );
}
