use std::collections::{BTreeMap, HashMap};

use crate::types::{ConnId, Member};

/// Per-sender store holding at most one request of a single kind
///
/// A second save for a sender that already has an entry is a no-op, so a
/// sender's vote can never be counted twice or replaced.
#[derive(Debug, Clone)]
pub struct RequestRepository<R> {
    reqs: HashMap<ConnId, R>,
}

impl<R> Default for RequestRepository<R> {
    fn default() -> Self {
        RequestRepository {
            reqs: HashMap::new(),
        }
    }
}

impl<R> RequestRepository<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a request, returning `false` if the sender already had one
    pub fn save(&mut self, sender: &Member, req: R) -> bool {
        let conn_id = sender.conn_id();
        if self.reqs.contains_key(&conn_id) {
            return false;
        }
        self.reqs.insert(conn_id, req);
        true
    }

    pub fn find(&self, sender: &Member) -> Option<&R> {
        self.reqs.get(&sender.conn_id())
    }

    /// All stored requests, in no particular order
    pub fn find_all(&self) -> impl Iterator<Item = &R> {
        self.reqs.values()
    }

    pub fn len(&self) -> usize {
        self.reqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reqs.is_empty()
    }

    pub fn clear(&mut self) {
        self.reqs.clear();
    }
}

/// Requests that arrived for a round this instance has not reached yet
#[derive(Debug, Clone)]
pub struct IncomingRequestRepository<R> {
    by_round: BTreeMap<u64, Vec<(Member, R)>>,
}

impl<R> Default for IncomingRequestRepository<R> {
    fn default() -> Self {
        IncomingRequestRepository {
            by_round: BTreeMap::new(),
        }
    }
}

impl<R: PartialEq> IncomingRequestRepository<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a request, returning `false` for an exact replay
    pub fn save(&mut self, round: u64, sender: Member, req: R) -> bool {
        let pending = self.by_round.entry(round).or_default();
        if pending.iter().any(|(s, r)| *s == sender && *r == req) {
            return false;
        }
        pending.push((sender, req));
        true
    }

    /// Remove and return everything buffered for `round`, in arrival order
    pub fn take(&mut self, round: u64) -> Vec<(Member, R)> {
        self.by_round.remove(&round).unwrap_or_default()
    }

    /// Drop everything buffered for rounds before `round`
    pub fn prune_below(&mut self, round: u64) {
        self.by_round = self.by_round.split_off(&round);
    }

    pub fn len(&self) -> usize {
        self.by_round.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
