//! Storage market records as reported by a node.
//!
//! Field names follow the node's JSON encoding (`Miner`, `ID`, `SupportedSectors`,
//! ...). Numeric amounts may arrive either as JSON numbers or as decimal strings,
//! so every integer field goes through [`de::u64_lenient`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a storage provider (the miner actor address, e.g. `t2abc...`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A provider's standing offer to store data
///
/// `id` increases monotonically per provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ask {
    #[serde(rename = "Miner")]
    pub miner: ProviderId,

    #[serde(rename = "ID", deserialize_with = "de::u64_lenient")]
    pub id: u64,

    /// Price per byte per block, kept in the node's decimal notation
    #[serde(rename = "Price", default, deserialize_with = "de::string_lenient")]
    pub price: String,

    /// Block height after which the ask is no longer honoured
    #[serde(
        rename = "Expiry",
        default,
        deserialize_with = "de::opt_u64_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiry: Option<u64>,
}

impl Ask {
    pub fn new(miner: impl Into<ProviderId>, id: u64) -> Self {
        Self {
            miner: miner.into(),
            id,
            price: String::new(),
            expiry: None,
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }
}

impl fmt::Display for Ask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ask {} from {}", self.id, self.miner)
    }
}

/// One element of the `list-asks` stream.
///
/// The node reports per-ask lookup failures inline through `Error`.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRecord {
    #[serde(flatten)]
    pub ask: Ask,

    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

/// Reference to a proposed deal (the proposal CID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealRef(String);

impl DealRef {
    pub fn new(cid: impl Into<String>) -> Self {
        Self(cid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a storage deal
///
/// Numeric codes match the node's wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DealState {
    Unset,
    Unknown,
    Rejected,
    Accepted,
    Started,
    Failed,
    Staged,
    Complete,
}

impl DealState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealState::Unset => "unset",
            DealState::Unknown => "unknown",
            DealState::Rejected => "rejected",
            DealState::Accepted => "accepted",
            DealState::Started => "started",
            DealState::Failed => "failed",
            DealState::Staged => "staged",
            DealState::Complete => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DealState::Complete | DealState::Failed | DealState::Rejected
        )
    }

    pub fn is_success(&self) -> bool {
        *self == DealState::Complete
    }
}

impl fmt::Display for DealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u64> for DealState {
    type Error = String;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => DealState::Unset,
            1 => DealState::Unknown,
            2 => DealState::Rejected,
            3 => DealState::Accepted,
            4 => DealState::Started,
            5 => DealState::Failed,
            6 => DealState::Staged,
            7 => DealState::Complete,
            other => return Err(format!("unknown deal state code {}", other)),
        })
    }
}

impl FromStr for DealState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "unset" => DealState::Unset,
            "unknown" => DealState::Unknown,
            "rejected" => DealState::Rejected,
            "accepted" => DealState::Accepted,
            "started" => DealState::Started,
            "failed" => DealState::Failed,
            "staged" => DealState::Staged,
            "complete" => DealState::Complete,
            other => return Err(format!("unknown deal state '{}'", other)),
        })
    }
}

impl<'de> Deserialize<'de> for DealState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => DealState::try_from(code).map_err(serde::de::Error::custom),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Snapshot of a deal as answered by a status query
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DealStatus {
    #[serde(rename = "State")]
    pub state: DealState,

    /// Provider-supplied explanation, usually empty unless rejected or failed
    #[serde(rename = "Message", default)]
    pub message: String,
}

impl DealStatus {
    pub fn new(state: DealState) -> Self {
        Self {
            state,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Sector geometry supported by the network
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectorInfo {
    #[serde(rename = "Size", deserialize_with = "de::u64_lenient")]
    pub size: u64,

    /// Largest payload a single deal may carry for this sector size
    #[serde(rename = "MaxPieceSize", deserialize_with = "de::u64_lenient")]
    pub max_piece_size: u64,
}

/// Active network protocol parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProtocolParams {
    #[serde(rename = "AutoSealInterval", default, deserialize_with = "de::u64_lenient_default")]
    pub auto_seal_interval: u64,

    #[serde(rename = "BlockTime", default, deserialize_with = "de::u64_lenient_default")]
    pub block_time: u64,

    #[serde(rename = "ProofsMode", default, deserialize_with = "de::string_lenient")]
    pub proofs_mode: String,

    #[serde(rename = "SupportedSectors", default)]
    pub supported_sectors: Vec<SectorInfo>,
}

impl ProtocolParams {
    /// Params advertising a single sector with the given piece size
    pub fn with_max_piece_size(max_piece_size: u64) -> Self {
        Self {
            auto_seal_interval: 0,
            block_time: 0,
            proofs_mode: String::new(),
            supported_sectors: vec![SectorInfo {
                size: max_piece_size,
                max_piece_size,
            }],
        }
    }

    /// Max piece size of the first supported sector
    pub fn max_piece_size(&self) -> Option<u64> {
        self.supported_sectors.first().map(|s| s.max_piece_size)
    }
}

pub(crate) mod de {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Num(u64),
        Str(String),
        Null(()),
    }

    pub fn u64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Lenient::deserialize(d)? {
            Lenient::Num(n) => Ok(n),
            Lenient::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
            Lenient::Null(()) => Err(serde::de::Error::custom("expected integer, found null")),
        }
    }

    pub fn u64_lenient_default<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        Ok(opt_u64_lenient(d)?.unwrap_or_default())
    }

    pub fn opt_u64_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        match Lenient::deserialize(d)? {
            Lenient::Num(n) => Ok(Some(n)),
            Lenient::Str(s) if s.trim().is_empty() => Ok(None),
            Lenient::Str(s) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
            Lenient::Null(()) => Ok(None),
        }
    }

    pub fn string_lenient<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Lenient::deserialize(d)? {
            Lenient::Num(n) => Ok(n.to_string()),
            Lenient::Str(s) => Ok(s),
            Lenient::Null(()) => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_record_decodes_node_encoding() {
        let line = r#"{"Miner":"t2miner","Price":"0.00000001","Expiry":"1200","ID":3,"Error":null}"#;
        let record: AskRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.ask.miner, ProviderId::from("t2miner"));
        assert_eq!(record.ask.id, 3);
        assert_eq!(record.ask.price, "0.00000001");
        assert_eq!(record.ask.expiry, Some(1200));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_ask_record_with_string_id_and_error() {
        let line = r#"{"Miner":"t2miner","ID":"7","Error":"failed to get ask"}"#;
        let record: AskRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.ask.id, 7);
        assert_eq!(record.error.as_deref(), Some("failed to get ask"));
    }

    #[test]
    fn test_ask_record_missing_id_is_rejected() {
        let line = r#"{"Miner":"t2miner","Price":"1"}"#;
        assert!(serde_json::from_str::<AskRecord>(line).is_err());
    }

    #[test]
    fn test_deal_state_from_code_and_name() {
        let from_code: DealStatus = serde_json::from_str(r#"{"State":7}"#).unwrap();
        assert_eq!(from_code.state, DealState::Complete);

        let from_name: DealStatus =
            serde_json::from_str(r#"{"State":"rejected","Message":"price too low"}"#).unwrap();
        assert_eq!(from_name.state, DealState::Rejected);
        assert_eq!(from_name.message, "price too low");

        assert!(serde_json::from_str::<DealStatus>(r#"{"State":42}"#).is_err());
    }

    #[test]
    fn test_deal_state_terminality() {
        assert!(DealState::Complete.is_terminal());
        assert!(DealState::Complete.is_success());
        assert!(DealState::Failed.is_terminal());
        assert!(DealState::Rejected.is_terminal());
        assert!(!DealState::Rejected.is_success());
        assert!(!DealState::Staged.is_terminal());
        assert!(!DealState::Accepted.is_terminal());
    }

    #[test]
    fn test_protocol_params_max_piece_size() {
        let json = r#"{
            "AutoSealInterval": 120,
            "BlockTime": "30000000000",
            "ProofsMode": "TestProofsMode",
            "SupportedSectors": [
                {"Size": "1024", "MaxPieceSize": "1016"},
                {"Size": 268435456, "MaxPieceSize": 266338304}
            ]
        }"#;
        let params: ProtocolParams = serde_json::from_str(json).unwrap();

        assert_eq!(params.auto_seal_interval, 120);
        assert_eq!(params.max_piece_size(), Some(1016));
        assert_eq!(params.supported_sectors.len(), 2);
    }

    #[test]
    fn test_protocol_params_without_sectors() {
        let params: ProtocolParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.max_piece_size(), None);
    }
}
