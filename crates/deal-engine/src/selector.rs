//! Ask Selector
//!
//! Reduces a round's asks to at most one per allowlisted provider. When a
//! provider has several asks in the same round, the one with the **lowest**
//! id is kept: ids grow per provider, and the oldest standing ask is taken as
//! the one the provider's own bookkeeping has settled on.

use deal_maker_node_interface::{Ask, ProviderId};
use std::collections::{BTreeMap, HashSet};

/// Providers the client is willing to deal with, fixed at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist {
    providers: HashSet<ProviderId>,
}

impl Allowlist {
    pub fn new<I, P>(providers: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<ProviderId>,
    {
        Self {
            providers: providers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, provider: &ProviderId) -> bool {
        self.providers.contains(provider)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// One ask per provider, rebuilt every round
pub type SelectedAsks = BTreeMap<ProviderId, Ask>;

/// How the selector treated an ask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consideration {
    /// First ask seen for this provider
    Recorded,
    /// Displaced the recorded ask, whose id was higher
    Replaced { previous: u64 },
    /// Dropped: the recorded ask's id is lower or equal
    Superseded { kept: u64 },
    /// Provider is not on the allowlist
    NotAllowed,
}

/// Incremental selector fed one ask at a time as the stream decodes
#[derive(Debug)]
pub struct AskSelector<'a> {
    allowlist: &'a Allowlist,
    selected: SelectedAsks,
}

impl<'a> AskSelector<'a> {
    pub fn new(allowlist: &'a Allowlist) -> Self {
        Self {
            allowlist,
            selected: SelectedAsks::new(),
        }
    }

    pub fn consider(&mut self, ask: Ask) -> Consideration {
        if !self.allowlist.contains(&ask.miner) {
            return Consideration::NotAllowed;
        }

        match self.selected.get_mut(&ask.miner) {
            None => {
                self.selected.insert(ask.miner.clone(), ask);
                Consideration::Recorded
            }
            Some(recorded) if ask.id >= recorded.id => Consideration::Superseded {
                kept: recorded.id,
            },
            Some(recorded) => {
                let previous = recorded.id;
                *recorded = ask;
                Consideration::Replaced { previous }
            }
        }
    }

    pub fn finish(self) -> SelectedAsks {
        self.selected
    }
}

/// Select from a complete batch of asks
pub fn select<I>(asks: I, allowlist: &Allowlist) -> SelectedAsks
where
    I: IntoIterator<Item = Ask>,
{
    let mut selector = AskSelector::new(allowlist);
    for ask in asks {
        selector.consider(ask);
    }
    selector.finish()
}
