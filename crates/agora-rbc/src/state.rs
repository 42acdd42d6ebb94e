use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use agora_core::{Broadcaster, Config, Hash, Member, Message, Payload, RbcMessage, RequestRepository};
use tracing::{debug, info, warn};

use crate::erasure::ErasureCoder;
use crate::error::RbcError;
use crate::merkle::MerkleTree;
use crate::request::{EchoRequest, RbcRequest, ReadyRequest, ValRequest};

/// Threshold crossings queued while a request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    /// `n - f` echoes share this root
    EchoQuorum(Hash),
    /// `f + 1` readies share this root
    ReadyAmplify(Hash),
    /// `2f + 1` readies share this root
    ReadyQuorum(Hash),
}

/// Reliable broadcast state for one (epoch, proposer)
///
/// Synchronous and single-owner; `Rbc` runs it on a worker task.
pub struct RbcState {
    n: usize,
    f: usize,
    owner: Member,
    proposer: Member,
    coder: ErasureCoder,

    /// Length of the proposer's payload, taken from the first shard whose
    /// proof checks out
    content_length: Option<u64>,

    echo_repo: RequestRepository<EchoRequest>,
    ready_repo: RequestRepository<ReadyRequest>,

    val_received: bool,
    echo_sent: bool,
    ready_sent: bool,

    /// Values recovered from echoes, by root
    interpolated: HashMap<Hash, Vec<u8>>,
    value: Option<Vec<u8>>,

    events: VecDeque<Event>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl RbcState {
    pub fn new(
        config: &Config,
        proposer: Member,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, RbcError> {
        config
            .validate()
            .map_err(|e| RbcError::ConfigError(e.to_string()))?;

        let num_parity_shards = config.f;
        let num_data_shards = config.n - num_parity_shards;
        let coder = ErasureCoder::new(num_data_shards, num_parity_shards)?;

        Ok(RbcState {
            n: config.n,
            f: config.f,
            owner: config.address.clone(),
            proposer,
            coder,
            content_length: None,
            echo_repo: RequestRepository::new(),
            ready_repo: RequestRepository::new(),
            val_received: false,
            echo_sent: false,
            ready_sent: false,
            interpolated: HashMap::new(),
            value: None,
            events: VecDeque::new(),
            broadcaster,
        })
    }

    pub fn proposer(&self) -> &Member {
        &self.proposer
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub fn val_received(&self) -> bool {
        self.val_received
    }

    pub fn echo_sent(&self) -> bool {
        self.echo_sent
    }

    pub fn ready_sent(&self) -> bool {
        self.ready_sent
    }

    /// Shard the proposer's value and return the VALs for the other members
    ///
    /// Shard 0 is handled locally as if received, which broadcasts this
    /// member's ECHO.
    pub fn make_request(&mut self, data: &[u8]) -> Result<Vec<RbcRequest>, RbcError> {
        if self.owner != self.proposer {
            return Err(RbcError::NotProposer(self.owner.to_string()));
        }
        let content_length = data.len() as u64;
        self.check_content_length(content_length)?;

        let shards = self.coder.shard(data)?;
        let tree = MerkleTree::build(&shards);
        let root_hash = tree.commitment(content_length);

        let mut reqs = Vec::with_capacity(shards.len());
        for (index, shard) in shards.into_iter().enumerate() {
            let path = tree
                .path(index)
                .ok_or_else(|| RbcError::CodingError(format!("no proof for shard {index}")))?;
            reqs.push(ValRequest {
                root_hash,
                data: shard,
                path,
            });
        }

        let mut reqs = reqs.into_iter();
        let own = reqs
            .next()
            .ok_or_else(|| RbcError::CodingError("no shards produced".to_string()))?;
        let proposer = self.proposer.clone();
        self.handle_val(&proposer, own, content_length)?;
        self.process_events();

        info!(
            "[MAKE] owner: {}, root: {}, length: {}",
            self.owner,
            root_hash.short(),
            data.len()
        );

        Ok(reqs.map(RbcRequest::Val).collect())
    }

    /// Decode and handle one inbound message
    pub fn handle_message(&mut self, sender: &Member, msg: RbcMessage) -> Result<(), RbcError> {
        if msg.proposer != self.proposer {
            return Err(RbcError::NotProposer(format!(
                "message for {} reached the instance of {}",
                msg.proposer, self.proposer
            )));
        }

        let req = RbcRequest::decode(msg.kind, &msg.payload)?;

        // A READY votes on a commitment that already binds the length
        let result = match req {
            RbcRequest::Val(req) => self
                .check_content_length(msg.content_length)
                .and_then(|()| self.handle_val(sender, req, msg.content_length)),
            RbcRequest::Echo(req) => self
                .check_content_length(msg.content_length)
                .and_then(|()| self.handle_echo(sender, req, msg.content_length)),
            RbcRequest::Ready(req) => self.handle_ready(sender, req),
        };
        self.process_events();
        result
    }

    fn check_content_length(&self, received: u64) -> Result<(), RbcError> {
        match self.content_length {
            Some(known) if known != received => {
                warn!(
                    "[LENGTH] owner: {}, known: {}, received: {}",
                    self.owner, known, received
                );
                Err(RbcError::LengthMismatch { known, received })
            }
            _ => Ok(()),
        }
    }

    /// Proof, tree shape and shard size all match `content_length`
    fn shard_is_valid(&self, data: &[u8], proof_ok: bool, content_length: u64) -> bool {
        proof_ok && data.len() == self.coder.shard_len(content_length as usize)
    }

    fn handle_val(
        &mut self,
        sender: &Member,
        req: ValRequest,
        content_length: u64,
    ) -> Result<(), RbcError> {
        if *sender != self.proposer {
            warn!("[VAL] rejected from non-proposer {}", sender);
            return Err(RbcError::NotProposer(sender.to_string()));
        }
        if self.val_received {
            return Err(RbcError::AlreadyProcessed(
                "VAL already received".to_string(),
            ));
        }
        if self.echo_sent {
            return Err(RbcError::AlreadyProcessed(format!(
                "ECHO already sent, sender: {sender}"
            )));
        }
        let proof_ok = req.validate(self.coder.total_shards(), content_length);
        if !self.shard_is_valid(&req.data, proof_ok, content_length) {
            warn!("[VAL] invalid proof from {}", sender);
            return Err(RbcError::InvalidValue("invalid VAL proof".to_string()));
        }

        self.content_length.get_or_insert(content_length);
        self.val_received = true;
        self.echo_sent = true;
        self.broadcast(RbcRequest::Echo(req.into()))?;

        info!(
            "[VAL] owner: {}, proposer: {}, sender: {}",
            self.owner, self.proposer, sender
        );
        Ok(())
    }

    fn handle_echo(
        &mut self,
        sender: &Member,
        req: EchoRequest,
        content_length: u64,
    ) -> Result<(), RbcError> {
        let proof_ok = req.validate(self.coder.total_shards(), content_length);
        if !self.shard_is_valid(&req.data, proof_ok, content_length) {
            warn!("[ECHO] invalid proof from {}", sender);
            return Err(RbcError::InvalidValue("invalid ECHO proof".to_string()));
        }
        self.content_length.get_or_insert(content_length);

        let root_hash = req.root_hash;
        if !self.echo_repo.save(sender, req) {
            return Err(RbcError::AlreadyProcessed(format!(
                "ECHO from {sender}"
            )));
        }

        let count = self.count_echos(&root_hash);
        debug!(
            "[ECHO] owner: {}, sender: {}, root: {}, count: {}/{}",
            self.owner,
            sender,
            root_hash.short(),
            count,
            self.echo_threshold()
        );

        if count >= self.echo_threshold() && !self.interpolated.contains_key(&root_hash) {
            self.events.push_back(Event::EchoQuorum(root_hash));
        }
        Ok(())
    }

    fn handle_ready(&mut self, sender: &Member, req: ReadyRequest) -> Result<(), RbcError> {
        let root_hash = req.root_hash;
        if !self.ready_repo.save(sender, req) {
            return Err(RbcError::AlreadyProcessed(format!(
                "READY from {sender}"
            )));
        }

        let count = self.count_readys(&root_hash);
        debug!(
            "[READY] owner: {}, sender: {}, root: {}, count: {}",
            self.owner,
            sender,
            root_hash.short(),
            count
        );

        if count >= self.ready_threshold() && !self.ready_sent {
            self.events.push_back(Event::ReadyAmplify(root_hash));
        }
        if count >= self.output_threshold() {
            self.events.push_back(Event::ReadyQuorum(root_hash));
        }
        Ok(())
    }

    /// Drain queued threshold events in order
    ///
    /// Failures here are local to the attempt; the next message retries.
    fn process_events(&mut self) {
        while let Some(event) = self.events.pop_front() {
            match event {
                Event::EchoQuorum(root_hash) => self.on_echo_quorum(root_hash),
                Event::ReadyAmplify(root_hash) => self.send_ready(root_hash),
                Event::ReadyQuorum(root_hash) => self.try_deliver(root_hash),
            }
        }
    }

    fn on_echo_quorum(&mut self, root_hash: Hash) {
        if self.interpolated.contains_key(&root_hash) {
            return;
        }

        match self.interpolate(&root_hash) {
            Ok(value) => {
                debug!(
                    "[ECHO] owner: {}, interpolated {} bytes for root {}",
                    self.owner,
                    value.len(),
                    root_hash.short()
                );
                self.interpolated.insert(root_hash, value);
                self.send_ready(root_hash);
                self.try_deliver(root_hash);
            }
            Err(RbcError::RootMismatch) => {
                warn!(
                    "[ECHO] owner: {}, shards for root {} do not re-encode to it",
                    self.owner,
                    root_hash.short()
                );
            }
            Err(e) => {
                debug!(
                    "[ECHO] owner: {}, waiting for more echoes: {}",
                    self.owner, e
                );
            }
        }
    }

    fn send_ready(&mut self, root_hash: Hash) {
        if self.ready_sent {
            return;
        }
        self.ready_sent = true;

        if let Err(e) = self.broadcast(RbcRequest::Ready(ReadyRequest { root_hash })) {
            warn!("[READY] owner: {}, broadcast failed: {}", self.owner, e);
            return;
        }
        info!(
            "[READY] owner: {}, proposer: {}, root: {}",
            self.owner,
            self.proposer,
            root_hash.short()
        );
    }

    fn try_deliver(&mut self, root_hash: Hash) {
        if self.value.is_some() || self.count_readys(&root_hash) < self.output_threshold() {
            return;
        }

        if let Some(value) = self.interpolated.get(&root_hash) {
            info!(
                "[DELIVER] owner: {}, proposer: {}, root: {}, length: {}",
                self.owner,
                self.proposer,
                root_hash.short(),
                value.len()
            );
            self.value = Some(value.clone());
        }
    }

    /// Recover the value committed under `root_hash` from recorded echoes
    fn interpolate(&self, root_hash: &Hash) -> Result<Vec<u8>, RbcError> {
        let total = self.coder.total_shards();
        let mut shards: Vec<Option<Vec<u8>>> = vec![None; total];

        for echo in self.echo_repo.find_all() {
            if echo.root_hash != *root_hash {
                continue;
            }
            let position = echo.position();
            if position < total {
                shards[position] = Some(echo.data.clone());
            }
        }

        let content_length = self
            .content_length
            .ok_or_else(|| RbcError::CodingError("content length unknown".to_string()))?;

        self.coder.reconstruct(&mut shards)?;
        let shards: Vec<Vec<u8>> = shards
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RbcError::CodingError("shard missing after reconstruct".to_string()))?;

        // A proposer may commit to shards that are not a codeword
        let data_shards = shards[..self.coder.data_shards()].to_vec();
        let reencoded = self.coder.encode(data_shards)?;
        if MerkleTree::build(&reencoded).commitment(content_length) != *root_hash {
            return Err(RbcError::RootMismatch);
        }

        self.coder.join(&shards, content_length as usize)
    }

    fn broadcast(&self, req: RbcRequest) -> Result<(), RbcError> {
        let msg = req.to_message(&self.proposer, self.content_length.unwrap_or_default())?;
        self.broadcaster
            .share_message(Message::new(self.owner.clone(), Payload::Rbc(msg)));
        Ok(())
    }

    fn count_echos(&self, root_hash: &Hash) -> usize {
        self.echo_repo
            .find_all()
            .filter(|req| req.root_hash == *root_hash)
            .count()
    }

    fn count_readys(&self, root_hash: &Hash) -> usize {
        self.ready_repo
            .find_all()
            .filter(|req| req.root_hash == *root_hash)
            .count()
    }

    /// Echoes needed before interpolating
    fn echo_threshold(&self) -> usize {
        self.n - self.f
    }

    /// Readies that make this member send its own READY
    fn ready_threshold(&self) -> usize {
        self.f + 1
    }

    /// Readies needed to deliver
    fn output_threshold(&self) -> usize {
        2 * self.f + 1
    }
}
