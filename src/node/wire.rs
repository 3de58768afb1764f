//! JSON shapes printed by `go-filecoin ... --enc=json`

use deal_maker_node_interface::{DealRef, DealState};
use serde::Deserialize;

/// IPLD link form of a CID: `{"/": "Qm..."}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CidLink {
    #[serde(rename = "/")]
    pub cid: String,
}

/// Reply to `client propose-storage-deal`
#[derive(Debug, Clone, Deserialize)]
pub struct ProposalResponse {
    #[serde(rename = "State")]
    pub state: DealState,

    #[serde(rename = "Message", default)]
    pub message: String,

    #[serde(rename = "ProposalCid")]
    pub proposal_cid: CidLink,
}

impl ProposalResponse {
    pub fn deal_ref(&self) -> DealRef {
        DealRef::new(self.proposal_cid.cid.clone())
    }
}

/// Reply to `id`; only used as a liveness probe
#[derive(Debug, Clone, Deserialize)]
pub struct IdResponse {
    #[serde(rename = "ID")]
    pub id: String,

    #[serde(rename = "Addresses", default)]
    pub addresses: Vec<String>,
}
