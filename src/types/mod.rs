//! Domain types for the multi-chain log indexing core.
//!
//! - [`enums`] - `ChainType`, `ListenerStrategy`, `ListenerState`, `TransferType`
//! - [`primitives`] - Validated newtypes (`EthAddress`, `ChainId`, `TopicHash`, `TokenAmount`, `BlockNumber`)
//! - [`events`] - Decoded event payloads (`DecodedEvent` and friends)
//! - [`entities`] - Domain entities persisted by the external stores

pub mod entities;
pub mod enums;
pub mod events;
pub mod primitives;

pub use entities::{
    BlockchainEvent, BlockchainEventData, ChainConfig, ContractConfig, ContractData,
    ContractDataMetadata, ContractIdentity, ContractMetadata, EventPayload, NativeCurrency,
    TransferProcessingResult,
};
pub use enums::{ChainType, ListenerState, ListenerStrategy, TransferType};
pub use events::{ApprovalArgs, DecodedEvent, EventMetadata, RawArgs, TransferArgs};
pub use primitives::{BlockNumber, ChainId, EthAddress, TokenAmount, TopicHash};
