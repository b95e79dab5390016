// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tagged wire format for cached values.
//!
//! Every value is written as
//!
//! ```json
//! {"kind": "country", "v": 1, "data": {"name": "Vali", ...}}
//! ```
//!
//! A reader asks for a specific [`Cacheable`] type. Anything that does not
//! decode as that kind at the current schema version is rejected with an
//! [`EnvelopeError`], which the cache reports as a miss.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::{CountryRecord, ImageEntry};

/// Bumped whenever a cached payload shape changes.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Country,
    CountryList,
    ImageList,
}

/// A type that may be stored in the cache.
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync {
    const KIND: RecordKind;
}

impl Cacheable for CountryRecord {
    const KIND: RecordKind = RecordKind::Country;
}

impl Cacheable for Vec<CountryRecord> {
    const KIND: RecordKind = RecordKind::CountryList;
}

impl Cacheable for Vec<ImageEntry> {
    const KIND: RecordKind = RecordKind::ImageList;
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("undecodable cache value: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("expected kind {expected:?}, found {found:?}")]
    KindMismatch { expected: RecordKind, found: RecordKind },
    #[error("schema version {found} does not match {expected}")]
    VersionMismatch { expected: u32, found: u32 },
}

#[derive(Serialize)]
struct Outgoing<'a, T> {
    kind: RecordKind,
    v: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Incoming {
    kind: RecordKind,
    v: u32,
    data: serde_json::Value,
}

/// Serialize `value` inside an envelope.
pub fn encode<T: Cacheable>(value: &T) -> Result<String, EnvelopeError> {
    Ok(serde_json::to_string(&Outgoing {
        kind: T::KIND,
        v: SCHEMA_VERSION,
        data: value,
    })?)
}

/// Decode an envelope, checking kind and version before the payload.
pub fn decode<T: Cacheable>(raw: &str) -> Result<T, EnvelopeError> {
    let incoming: Incoming = serde_json::from_str(raw)?;
    if incoming.kind != T::KIND {
        return Err(EnvelopeError::KindMismatch {
            expected: T::KIND,
            found: incoming.kind,
        });
    }
    if incoming.v != SCHEMA_VERSION {
        return Err(EnvelopeError::VersionMismatch {
            expected: SCHEMA_VERSION,
            found: incoming.v,
        });
    }
    Ok(serde_json::from_value(incoming.data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vali() -> CountryRecord {
        CountryRecord::new("Vali", "Europe", 1_000_000, 50_000.0).unwrap()
    }

    #[test]
    fn test_encode_shape() {
        let raw = encode(&vali()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["kind"], "country");
        assert_eq!(value["v"], 1);
        assert_eq!(value["data"]["name"], "Vali");
        assert_eq!(value["data"]["population_density"], 20.0);
    }

    #[test]
    fn test_decode_matching_kind() {
        let raw = encode(&vec![vali()]).unwrap();
        let list: Vec<CountryRecord> = decode(&raw).unwrap();
        assert_eq!(list, vec![vali()]);
    }

    #[test]
    fn test_kind_mismatch() {
        let raw = encode(&vali()).unwrap();
        let err = decode::<Vec<CountryRecord>>(&raw).unwrap_err();
        assert!(matches!(err, EnvelopeError::KindMismatch { .. }));
    }

    #[test]
    fn test_version_mismatch() {
        let raw = r#"{"kind":"country","v":99,"data":{}}"#;
        let err = decode::<CountryRecord>(raw).unwrap_err();
        assert!(matches!(err, EnvelopeError::VersionMismatch { found: 99, .. }));
    }

    #[test]
    fn test_legacy_untagged_value_rejected() {
        // A bare record written without an envelope
        let raw = serde_json::to_string(&vali()).unwrap();
        assert!(decode::<CountryRecord>(&raw).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decode::<Vec<ImageEntry>>("not json").is_err());
        assert!(decode::<Vec<ImageEntry>>(r#"{"kind":"image_list","v":1,"data":42}"#).is_err());
    }
}
