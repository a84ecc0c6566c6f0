//! Transfer handler: classification, counters, and persistence (spec.md §4.6).
//!
//! For every decoded `Transfer`, in order:
//! 1. Classify mint/burn/transfer by comparing `from`/`to` against the zero
//!    address only — no dead-address convention, no allowlist.
//! 2. Log at `info`, plus an additional `warn` for large transfers or
//!    high-priority contracts and an additional `info` mint/burn line when
//!    `from`/`to` is the zero address — these are independent, not
//!    mutually exclusive.
//! 3. Persist the event itself, tolerating duplicates.
//! 4. Only if that persist was new (not a replay), upsert the contract's
//!    cached runtime facts (`ContractData`), folding in the new block and
//!    bumping the transfer/large-transfer counters.

use alloy::rpc::types::Log;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::handlers::traits::EventHandler;
use crate::ports::store::EventStore;
use crate::types::entities::{
    BlockchainEvent, BlockchainEventData, ContractConfig, ContractData, ContractDataMetadata,
    ContractIdentity, EventPayload, TransferProcessingResult,
};
use crate::types::enums::TransferType;
use crate::types::events::{DecodedEvent, EventMetadata, TransferArgs};
use crate::types::primitives::{BlockNumber, EthAddress};

/// Classifies, counts, and persists ERC-20 `Transfer` events.
pub struct TransferHandler {
    event_store: std::sync::Arc<dyn EventStore>,
}

impl TransferHandler {
    /// Build a new transfer handler backed by the given event store.
    #[must_use]
    pub fn new(event_store: std::sync::Arc<dyn EventStore>) -> Self {
        Self { event_store }
    }

    fn classify(from: alloy::primitives::Address, to: alloy::primitives::Address) -> TransferType {
        if from.is_zero() {
            TransferType::Mint
        } else if to.is_zero() {
            TransferType::Burn
        } else {
            TransferType::Transfer
        }
    }

    fn log_transfer(
        contract: &ContractConfig,
        meta: &EventMetadata,
        args: &TransferArgs,
        transfer_type: TransferType,
    ) {
        let escalated =
            args.is_large_transfer || contract.metadata.priority.as_deref() == Some("high");
        let is_mint_or_burn = matches!(transfer_type, TransferType::Mint | TransferType::Burn);

        // Mint/burn is logged independently of escalation: a large mint must
        // still carry its own mint-specific line alongside the warn below.
        if is_mint_or_burn {
            info!(
                chain_id = %contract.chain_id,
                contract = %contract.address,
                from = %args.from,
                to = %args.to,
                amount = %args.value_formatted,
                transfer_type = transfer_type.name(),
                block = meta.block_number,
                "mint or burn"
            );
        }

        if escalated {
            warn!(
                chain_id = %contract.chain_id,
                contract = %contract.address,
                from = %args.from,
                to = %args.to,
                amount = %args.value_formatted,
                transfer_type = transfer_type.name(),
                block = meta.block_number,
                "large or high-priority transfer"
            );
        } else if !is_mint_or_burn {
            info!(
                chain_id = %contract.chain_id,
                contract = %contract.address,
                from = %args.from,
                to = %args.to,
                amount = %args.value_formatted,
                block = meta.block_number,
                "transfer"
            );
        }
    }

    async fn upsert_contract_data(
        &self,
        contract: &ContractConfig,
        meta: &EventMetadata,
        is_large_transfer: bool,
    ) -> Result<()> {
        let existing = self
            .event_store
            .get_contract_data(contract.chain_id, contract.address)
            .await?;

        let mut data = existing.unwrap_or_else(|| ContractData {
            chain_id: contract.chain_id,
            contract_address: contract.address,
            contract_type: contract.contract_type.clone(),
            collection_key: ContractData::collection_key(&contract.contract_type, contract.chain_id),
            name: contract.name.clone(),
            symbol: contract.symbol.clone(),
            decimals: contract.metadata.decimals,
            total_supply: None,
            owner: None,
            is_active: true,
            last_updated: Utc::now(),
            first_seen_block: None,
            last_processed_block: None,
            start_from_block: None,
            metadata: ContractDataMetadata::default(),
        });

        data.observe_block(BlockNumber::new(meta.block_number));
        data.metadata.transfer_count += 1;
        if is_large_transfer {
            data.metadata.large_transfer_count += 1;
        }
        data.metadata.last_transfer_timestamp = Some(meta.timestamp);
        data.last_updated = Utc::now();

        self.event_store.upsert_contract_data(&data).await?;
        Ok(())
    }

    fn build_blockchain_event(
        contract: &ContractConfig,
        meta: &EventMetadata,
        args: &TransferArgs,
        transfer_type: TransferType,
        raw_log: &Log,
    ) -> BlockchainEvent {
        let topics = raw_log
            .topics()
            .iter()
            .map(|t| format!("{t:#x}"))
            .collect();
        let raw_data = format!("0x{}", hex::encode(&raw_log.inner.data.data));

        let args_json = serde_json::json!({
            "from": args.from.to_string(),
            "to": args.to.to_string(),
            "valueRaw": args.value_raw.to_string(),
            "valueFormatted": args.value_formatted.to_string(),
            "isLargeTransfer": args.is_large_transfer,
        });

        BlockchainEvent {
            id: Uuid::new_v4(),
            chain_id: contract.chain_id,
            transaction_hash: format!("{:#x}", meta.tx_hash),
            log_index: meta.log_index,
            block_number: BlockNumber::new(meta.block_number),
            timestamp_ms: meta.timestamp.timestamp_millis(),
            event_type: "contract_log".to_string(),
            contract_address: contract.address,
            data: BlockchainEventData {
                topics,
                raw_data,
                log_index: meta.log_index,
                transaction_index: meta.tx_index,
                gas_used: meta.gas_used,
                tx_status: meta.tx_status,
                contract: ContractIdentity {
                    name: contract.name.clone(),
                    symbol: contract.symbol.clone(),
                    contract_type: contract.contract_type.clone(),
                },
                event: EventPayload {
                    name: "Transfer".to_string(),
                    signature: "Transfer(address,address,uint256)".to_string(),
                    args: args_json,
                },
            },
            processed: true,
            processed_at: Some(Utc::now()),
            processing_result: serde_json::to_value(TransferProcessingResult {
                transfer_type,
                token_amount: args.value_formatted,
            })
            .ok(),
        }
    }
}

#[async_trait]
impl EventHandler for TransferHandler {
    fn name(&self) -> &'static str {
        "transfer_handler"
    }

    fn can_handle(&self, event: &DecodedEvent) -> bool {
        matches!(event, DecodedEvent::Transfer(_))
    }

    async fn handle(
        &self,
        contract: &ContractConfig,
        meta: &EventMetadata,
        event: &DecodedEvent,
        raw_log: &Log,
    ) -> Result<()> {
        let DecodedEvent::Transfer(args) = event else {
            return Ok(());
        };

        let transfer_type = Self::classify(args.from, args.to);
        Self::log_transfer(contract, meta, args, transfer_type);

        let blockchain_event =
            Self::build_blockchain_event(contract, meta, args, transfer_type, raw_log);
        let inserted = self.event_store.insert_event(&blockchain_event).await?;
        if !inserted {
            debug!(
                tx_hash = %blockchain_event.transaction_hash,
                log_index = blockchain_event.log_index,
                "duplicate transfer event, already persisted"
            );
            return Ok(());
        }

        // Only fold this log into the cached contract counters once we know
        // it wasn't already persisted (spec.md §8 scenario 2: a replayed log
        // must not double-count transfers).
        self.upsert_contract_data(contract, meta, args.is_large_transfer)
            .await?;

        Ok(())
    }
}
