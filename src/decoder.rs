//! Log decoder (spec.md §4.4).
//!
//! Resolves a raw log's topic-0 against a contract's configured event list,
//! decodes `Transfer`/`Approval` into typed arguments via Alloy's `SolEvent`,
//! and falls back to `DecodedEvent::Raw` for any other configured event.

use alloy::primitives::{Log as PrimitiveLog, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use bigdecimal::BigDecimal;
use bigdecimal::num_bigint::BigInt;

use crate::abi::erc20;
use crate::error::IngestError;
use crate::types::entities::ContractConfig;
use crate::types::events::{ApprovalArgs, DecodedEvent, EventMetadata, RawArgs, TransferArgs};
use crate::types::primitives::TokenAmount;

/// Decode one raw log against the given contract's configuration.
///
/// Returns `Ok(None)` if the log's topic-0 isn't in `config.events` (the
/// caller should drop it silently, per the push/pull listener contract).
/// Returns `Err(IngestError::DecodeFailed)` if the topic matched but ABI
/// decoding failed — the caller logs at `warn` and drops the log, without
/// stopping the listener.
///
/// # Errors
///
/// Returns `IngestError::DecodeFailed` when the log's topic-0 is configured
/// but the log body doesn't decode against the expected event shape.
pub fn decode_log(
    log: &Log,
    config: &ContractConfig,
    meta: &EventMetadata,
) -> Result<Option<DecodedEvent>, IngestError> {
    let Some(topic0) = log.topics().first().copied() else {
        return Ok(None);
    };

    if !config.contains_event(topic0.into()) {
        return Ok(None);
    }

    let decode_failed = |reason: String| IngestError::DecodeFailed {
        topic0: format!("{topic0:#x}"),
        contract: meta.contract.to_string(),
        reason,
    };

    match topic0.as_slice() {
        x if x == erc20::Transfer::SIGNATURE_HASH.as_slice() => {
            let decoded = erc20::Transfer::decode_log(&log.inner)
                .map_err(|e| decode_failed(e.to_string()))?
                .data;
            let value_formatted = format_amount(decoded.value, config.metadata.decimals);
            let is_large_transfer = config.is_large_transfer(&value_formatted);
            Ok(Some(DecodedEvent::Transfer(TransferArgs {
                from: decoded.from,
                to: decoded.to,
                value_raw: decoded.value,
                value_formatted,
                is_large_transfer,
            })))
        }
        x if x == erc20::Approval::SIGNATURE_HASH.as_slice() => {
            let decoded = erc20::Approval::decode_log(&log.inner)
                .map_err(|e| decode_failed(e.to_string()))?
                .data;
            let value_formatted = format_amount(decoded.value, config.metadata.decimals);
            Ok(Some(DecodedEvent::Approval(ApprovalArgs {
                owner: decoded.owner,
                spender: decoded.spender,
                value_raw: decoded.value,
                value_formatted,
            })))
        }
        _ => Ok(Some(DecodedEvent::Raw(raw_args(&log.inner)))),
    }
}

fn raw_args(log: &PrimitiveLog) -> RawArgs {
    RawArgs {
        topics: log.topics().to_vec(),
        data: log.data.data.to_vec(),
    }
}

/// Scale a raw `U256` amount by `decimals`, capped at 6 fractional digits.
///
/// Deliberately lossy (spec.md §4.4): multiply by `10^6` before dividing by
/// `10^decimals`, integer-divide (truncating any remainder), then treat the
/// result as a fixed-point number with 6 fractional digits. This is not "full
/// precision scaled by decimals" — it is the exact formula the source uses,
/// preserved rather than "fixed". The persisted `valueFormatted` string
/// (en-US thousands grouping, 2-6 fractional digits) is produced by
/// `TokenAmount`'s `Display` impl, not by this function.
#[must_use]
pub fn format_amount(raw: U256, decimals: u8) -> TokenAmount {
    let raw_bigint: BigInt = raw.to_string().parse().unwrap_or_default();
    let numerator = raw_bigint * BigInt::from(1_000_000_u64);
    let denominator: BigInt = format!("1{}", "0".repeat(decimals as usize))
        .parse()
        .unwrap_or_else(|_| BigInt::from(1));

    // BigInt division truncates toward zero; both operands are non-negative
    // here so this is equivalent to a floor division.
    let quotient = numerator / denominator;
    let scaled = BigDecimal::new(quotient, 6);

    TokenAmount::new(scaled).unwrap_or_default()
}
