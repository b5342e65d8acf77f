// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FEEPOOL - LEDGER CODEC
//
// Textual key/value format of both fee ledgers. The format is shared with
// existing on-disk state and must stay bit-exact:
//
//   fee cache    key   = asset id, zero padded to 10 digits
//                value = "block:amount,block:amount,..." ascending by block
//   fee history  key   = record id, plain decimal
//                value = "block:asset:total:addr=amount,addr=amount,..."
//
// Decoding is split in two layers. `parse_*` functions are strict and
// return a CodecError for one bad item. `decode_*` functions walk a whole
// value, keep every item that parses and hand back the errors so the
// ledger can log them and carry on.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::fmt;

use crate::{AssetId, BlockHeight, CacheHistory, DistributionData, Recipients};

const ENTRY_SEPARATOR: &str = ",";
const FIELD_SEPARATOR: char = ':';
const RECIPIENT_SEPARATOR: char = '=';
const DISTRIBUTION_FIELDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Item did not split into the expected number of fields.
    FieldCount {
        expected: usize,
        found: usize,
        raw: String,
    },
    /// A numeric field was empty, non-numeric, negative or out of range.
    BadInteger { field: &'static str, raw: String },
    /// Recipient pair with no address before the `=`.
    EmptyAddress { raw: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::FieldCount {
                expected,
                found,
                raw,
            } => write!(
                f,
                "unexpected number of elements: {} (expected {}, raw {:?})",
                found, expected, raw
            ),
            CodecError::BadInteger { field, raw } => {
                write!(f, "invalid {} value {:?}", field, raw)
            }
            CodecError::EmptyAddress { raw } => write!(f, "recipient without address {:?}", raw),
        }
    }
}

impl std::error::Error for CodecError {}

/// Fee cache key for an asset.
pub fn cache_key(asset_id: AssetId) -> String {
    format!("{:010}", asset_id)
}

/// Fee history key for a record id.
pub fn history_key(id: u32) -> String {
    id.to_string()
}

pub fn parse_history_key(raw: &str) -> Result<u32, CodecError> {
    raw.parse().map_err(|_| CodecError::BadInteger {
        field: "record id",
        raw: raw.to_string(),
    })
}

fn parse_u64(field: &'static str, raw: &str) -> Result<u64, CodecError> {
    raw.parse().map_err(|_| CodecError::BadInteger {
        field,
        raw: raw.to_string(),
    })
}

fn parse_u32(field: &'static str, raw: &str) -> Result<u32, CodecError> {
    raw.parse().map_err(|_| CodecError::BadInteger {
        field,
        raw: raw.to_string(),
    })
}

/// Amounts are non-negative and fit in an i64.
fn parse_amount(field: &'static str, raw: &str) -> Result<i64, CodecError> {
    match raw.parse::<i64>() {
        Ok(v) if v >= 0 => Ok(v),
        _ => Err(CodecError::BadInteger {
            field,
            raw: raw.to_string(),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────
// FEE CACHE VALUES
// ─────────────────────────────────────────────────────────────────

pub fn encode_cache_history(history: &CacheHistory) -> String {
    history
        .iter()
        .map(|(block, amount)| format!("{}{}{}", block, FIELD_SEPARATOR, amount))
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// Parse one `block:amount` pair.
///
/// Every separator delimits a field, so doubled separators leave empty
/// fields and `5::3` is rejected rather than read as `5:3`.
pub fn parse_cache_entry(raw: &str) -> Result<(BlockHeight, i64), CodecError> {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if fields.len() != 2 {
        return Err(CodecError::FieldCount {
            expected: 2,
            found: fields.len(),
            raw: raw.to_string(),
        });
    }
    let block = parse_u64("block", fields[0])?;
    let amount = parse_amount("amount", fields[1])?;
    Ok((block, amount))
}

/// Decode a fee cache value, skipping malformed pairs.
///
/// Empty segments (an empty value, doubled separators) carry no entry and
/// are not reported. A later pair for an already seen block replaces it.
pub fn decode_cache_history(raw: &str) -> (CacheHistory, Vec<CodecError>) {
    let mut history = CacheHistory::new();
    let mut errors = Vec::new();
    for item in raw.split(ENTRY_SEPARATOR).filter(|s| !s.is_empty()) {
        match parse_cache_entry(item) {
            Ok((block, amount)) => {
                history.insert(block, amount);
            }
            Err(e) => errors.push(e),
        }
    }
    (history, errors)
}

// ─────────────────────────────────────────────────────────────────
// FEE HISTORY VALUES
// ─────────────────────────────────────────────────────────────────

/// `addr=amount` pairs in address order. Empty set encodes to "".
pub fn encode_recipients(recipients: &Recipients) -> String {
    recipients
        .iter()
        .map(|(address, amount)| format!("{}{}{}", address, RECIPIENT_SEPARATOR, amount))
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

pub fn parse_recipient(raw: &str) -> Result<(String, i64), CodecError> {
    let fields: Vec<&str> = raw.split(RECIPIENT_SEPARATOR).collect();
    if fields.len() != 2 {
        return Err(CodecError::FieldCount {
            expected: 2,
            found: fields.len(),
            raw: raw.to_string(),
        });
    }
    if fields[0].is_empty() {
        return Err(CodecError::EmptyAddress {
            raw: raw.to_string(),
        });
    }
    let amount = parse_amount("recipient amount", fields[1])?;
    Ok((fields[0].to_string(), amount))
}

pub fn decode_recipients(raw: &str) -> (Recipients, Vec<CodecError>) {
    let mut recipients = Recipients::new();
    let mut errors = Vec::new();
    for item in raw.split(ENTRY_SEPARATOR).filter(|s| !s.is_empty()) {
        match parse_recipient(item) {
            Ok((address, amount)) => {
                recipients.insert(address, amount);
            }
            Err(e) => errors.push(e),
        }
    }
    (recipients, errors)
}

pub fn encode_distribution(data: &DistributionData, recipients: &Recipients) -> String {
    format!(
        "{}:{}:{}:{}",
        data.block,
        data.asset_id,
        data.total,
        encode_recipients(recipients)
    )
}

/// Split a history value into its header and the raw recipient field.
/// The recipient field is left undecoded so scans that only need the
/// header do not pay for it. Empty fields are kept, as in
/// `parse_cache_entry`.
pub fn decode_distribution(raw: &str) -> Result<(DistributionData, &str), CodecError> {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if fields.len() != DISTRIBUTION_FIELDS {
        return Err(CodecError::FieldCount {
            expected: DISTRIBUTION_FIELDS,
            found: fields.len(),
            raw: raw.to_string(),
        });
    }
    let data = DistributionData {
        block: parse_u64("block", fields[0])?,
        asset_id: parse_u32("asset id", fields[1])?,
        total: parse_amount("total", fields[2])?,
    };
    Ok((data, fields[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(pairs: &[(u64, i64)]) -> CacheHistory {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_keys_are_fixed_format() {
        assert_eq!(cache_key(3), "0000000003");
        assert_eq!(cache_key(0x8000_0003), "2147483651");
        assert_eq!(cache_key(u32::MAX), "4294967295");
        assert_eq!(history_key(1), "1");
        assert_eq!(history_key(120), "120");
        assert_eq!(parse_history_key("120"), Ok(120));
        assert!(parse_history_key("0000000003x").is_err());
    }

    #[test]
    fn test_encode_cache_history() {
        assert_eq!(encode_cache_history(&CacheHistory::new()), "");
        assert_eq!(encode_cache_history(&history(&[(100, 70)])), "100:70");
        assert_eq!(
            encode_cache_history(&history(&[(30, 12), (10, 5), (20, 9)])),
            "10:5,20:9,30:12"
        );
    }

    #[test]
    fn test_decode_cache_history() {
        let (decoded, errors) = decode_cache_history("10:5,20:9,30:12");
        assert!(errors.is_empty());
        assert_eq!(decoded, history(&[(10, 5), (20, 9), (30, 12)]));
    }

    #[test]
    fn test_decode_empty_cache_value() {
        let (decoded, errors) = decode_cache_history("");
        assert!(decoded.is_empty());
        assert!(errors.is_empty());

        let (decoded, errors) = decode_cache_history(",,");
        assert!(decoded.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_decode_cache_skips_malformed_pairs() {
        let (decoded, errors) = decode_cache_history("10:5,20,abc:3,30:x,40:-1,50:1:2,60:8");
        assert_eq!(decoded, history(&[(10, 5), (60, 8)]));
        assert_eq!(errors.len(), 5);
        assert_eq!(
            errors[0],
            CodecError::FieldCount {
                expected: 2,
                found: 1,
                raw: "20".to_string()
            }
        );
        assert_eq!(
            errors[1],
            CodecError::BadInteger {
                field: "block",
                raw: "abc".to_string()
            }
        );
        assert_eq!(
            errors[2],
            CodecError::BadInteger {
                field: "amount",
                raw: "x".to_string()
            }
        );
    }

    #[test]
    fn test_parse_cache_entry_bounds() {
        assert_eq!(
            parse_cache_entry("5:9223372036854775807"),
            Ok((5, i64::MAX))
        );
        assert!(parse_cache_entry("5:9223372036854775808").is_err());
        assert!(parse_cache_entry(":5").is_err());
        assert!(parse_cache_entry("5:").is_err());
        assert!(parse_cache_entry("-5:1").is_err());
    }

    #[test]
    fn test_doubled_separators_are_not_compressed() {
        assert_eq!(
            parse_cache_entry("5::3"),
            Err(CodecError::FieldCount {
                expected: 2,
                found: 3,
                raw: "5::3".to_string()
            })
        );
        let (decoded, errors) = decode_cache_history("5::3,6:4");
        assert_eq!(decoded, history(&[(6, 4)]));
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            decode_distribution("60::7:105:alice=105"),
            Err(CodecError::FieldCount { found: 5, .. })
        ));
    }

    #[test]
    fn test_duplicate_block_last_wins() {
        let (decoded, _) = decode_cache_history("100:50,100:70");
        assert_eq!(decoded, history(&[(100, 70)]));
    }

    #[test]
    fn test_encode_distribution() {
        let data = DistributionData {
            asset_id: 7,
            block: 60,
            total: 105,
        };
        let mut recipients = Recipients::new();
        recipients.insert("bob".to_string(), 45);
        recipients.insert("alice".to_string(), 60);
        assert_eq!(
            encode_distribution(&data, &recipients),
            "60:7:105:alice=60,bob=45"
        );
        assert_eq!(encode_distribution(&data, &Recipients::new()), "60:7:105:");
    }

    #[test]
    fn test_decode_distribution() {
        let (data, raw_recipients) = decode_distribution("60:7:105:alice=60,bob=45").unwrap();
        assert_eq!(data.block, 60);
        assert_eq!(data.asset_id, 7);
        assert_eq!(data.total, 105);
        let (recipients, errors) = decode_recipients(raw_recipients);
        assert!(errors.is_empty());
        assert_eq!(recipients.get("alice"), Some(&60));
        assert_eq!(recipients.get("bob"), Some(&45));
    }

    #[test]
    fn test_decode_distribution_empty_recipients() {
        let (data, raw_recipients) = decode_distribution("60:7:0:").unwrap();
        assert_eq!(data.total, 0);
        assert_eq!(raw_recipients, "");
        let (recipients, errors) = decode_recipients(raw_recipients);
        assert!(recipients.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_decode_distribution_rejects_bad_headers() {
        assert!(matches!(
            decode_distribution(""),
            Err(CodecError::FieldCount { found: 1, .. })
        ));
        assert!(matches!(
            decode_distribution("60:7:105"),
            Err(CodecError::FieldCount { found: 3, .. })
        ));
        assert!(matches!(
            decode_distribution("60:7:105:a=1:b"),
            Err(CodecError::FieldCount { found: 5, .. })
        ));
        assert!(matches!(
            decode_distribution("sixty:7:105:"),
            Err(CodecError::BadInteger { field: "block", .. })
        ));
        assert!(matches!(
            decode_distribution("60:seven:105:"),
            Err(CodecError::BadInteger {
                field: "asset id",
                ..
            })
        ));
        assert!(matches!(
            decode_distribution("60:7::"),
            Err(CodecError::BadInteger { field: "total", .. })
        ));
    }

    #[test]
    fn test_decode_recipients_skips_malformed_pairs() {
        let (recipients, errors) = decode_recipients("alice=60,=5,bob,carol=x,dave=1=2,erin=3");
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients.get("alice"), Some(&60));
        assert_eq!(recipients.get("erin"), Some(&3));
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], CodecError::EmptyAddress { .. }));
    }
}
