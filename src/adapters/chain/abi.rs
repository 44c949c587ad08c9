//! AddToken ABI and Log Decoder
//!
//! Minimal ABI covering the single watched event, plus the decoder that
//! turns a raw RPC log into a validated `TokenAdded`.

use alloy::primitives::B256;
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::domain::{DecodeError, TokenAdded};

sol! {
    /// Emitted when the treasury starts supporting a token.
    #[derive(Debug, PartialEq, Eq)]
    event AddToken(address indexed currency, address indexed priceFeed, bool fixedPrice);
}

/// topic0 of `AddToken(address,address,bool)`.
pub const ADD_TOKEN_TOPIC: B256 = AddToken::SIGNATURE_HASH;

/// Decode one raw log.
///
/// Fails when the signature differs, topics/data do not match the field
/// types, or the log lacks block/transaction metadata.
pub fn decode_add_token(log: &Log) -> Result<TokenAdded, DecodeError> {
    let topic0 = log.topic0().ok_or(DecodeError::MissingSignature)?;
    if *topic0 != ADD_TOKEN_TOPIC {
        return Err(DecodeError::SignatureMismatch { found: *topic0 });
    }

    let decoded = log
        .log_decode::<AddToken>()
        .map_err(|e| DecodeError::Abi(e.to_string()))?;
    let event = decoded.inner.data;

    let tx_hash = log
        .transaction_hash
        .ok_or(DecodeError::MissingMetadata("transactionHash"))?;
    let block_number = log
        .block_number
        .ok_or(DecodeError::MissingMetadata("blockNumber"))?;

    Ok(TokenAdded {
        currency: event.currency,
        price_feed: event.priceFeed,
        fixed_price: event.fixedPrice,
        tx_hash,
        block_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Bytes, LogData};

    fn raw(data: LogData) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: address!("128463a60784c4d3f46c23af3f65ed859ba87974"),
                data,
            },
            block_number: Some(100),
            transaction_hash: Some(B256::with_last_byte(9)),
            ..Default::default()
        }
    }

    fn add_token() -> AddToken {
        AddToken {
            currency: address!("1111111111111111111111111111111111111111"),
            priceFeed: address!("2222222222222222222222222222222222222222"),
            fixedPrice: true,
        }
    }

    #[test]
    fn test_decodes_well_formed_log() {
        let event = decode_add_token(&raw(add_token().encode_log_data())).expect("decodes");
        assert_eq!(event.currency, add_token().currency);
        assert_eq!(event.price_feed, add_token().priceFeed);
        assert!(event.fixed_price);
        assert_eq!(event.block_number, 100);
        assert_eq!(event.tx_hash, B256::with_last_byte(9));
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let data = LogData::new_unchecked(vec![B256::with_last_byte(1)], Bytes::new());
        assert!(matches!(
            decode_add_token(&raw(data)),
            Err(DecodeError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_bool_payload_rejected() {
        let good = add_token().encode_log_data();
        let data = LogData::new_unchecked(good.topics().to_vec(), Bytes::new());
        assert!(matches!(decode_add_token(&raw(data)), Err(DecodeError::Abi(_))));
    }

    #[test]
    fn test_missing_indexed_topic_rejected() {
        let good = add_token().encode_log_data();
        let data = LogData::new_unchecked(good.topics()[..2].to_vec(), good.data.clone());
        assert!(matches!(decode_add_token(&raw(data)), Err(DecodeError::Abi(_))));
    }

    #[test]
    fn test_pending_log_rejected() {
        let mut log = raw(add_token().encode_log_data());
        log.block_number = None;
        assert_eq!(
            decode_add_token(&log),
            Err(DecodeError::MissingMetadata("blockNumber"))
        );
    }

    #[test]
    fn test_empty_topics_rejected() {
        let log = raw(LogData::new_unchecked(vec![], Bytes::new()));
        assert_eq!(decode_add_token(&log), Err(DecodeError::MissingSignature));
    }
}
