use std::collections::VecDeque;
use std::sync::Arc;

use agora_core::{
    BbaMessage, Binary, BinarySet, BinaryState, Broadcaster, CoinGenerator, Config,
    IncomingRequestRepository, Member, Message, Payload, RequestRepository,
};
use tracing::{debug, error, info, warn};

use crate::error::BbaError;
use crate::request::{AuxRequest, BbaRequest, BvalRequest};

/// How many rounds past the current one are buffered or supported
pub const MAX_FUTURE_ROUNDS: u64 = 8;

/// Threshold crossings queued while a request is handled
///
/// Each carries the round it was raised in and is dropped once the
/// instance has moved past that round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    /// `2f + 1` BVALs put `value` into bin values
    BinValueAdded { round: u64, value: Binary, first: bool },
    TryoutAgreement { round: u64 },
    AdvanceRound { round: u64 },
}

/// Snapshot of an agreement instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BbaStatus {
    pub epoch: u64,
    pub round: u64,
    pub est: Option<Binary>,
    pub dec: Option<Binary>,
    pub done: bool,
}

/// Binary agreement state for one epoch
pub struct BbaState {
    n: usize,
    f: usize,
    epoch: u64,
    round: u64,
    owner: Member,

    bin_values: BinarySet,
    broadcasted_bvals: BinarySet,
    est: BinaryState,
    dec: BinaryState,
    done: bool,
    tryout_pending: bool,
    /// Highest round this member has voted its decision into
    supported_round: u64,

    bval_repo: [RequestRepository<BvalRequest>; 2],
    aux_repo: RequestRepository<AuxRequest>,
    incoming: IncomingRequestRepository<BbaRequest>,

    events: VecDeque<Event>,
    broadcaster: Arc<dyn Broadcaster>,
    coin: Arc<dyn CoinGenerator>,
}

impl BbaState {
    pub fn new(
        config: &Config,
        epoch: u64,
        broadcaster: Arc<dyn Broadcaster>,
        coin: Arc<dyn CoinGenerator>,
    ) -> Result<Self, BbaError> {
        config
            .validate()
            .map_err(|e| BbaError::ConfigError(e.to_string()))?;

        Ok(BbaState {
            n: config.n,
            f: config.f,
            epoch,
            round: 0,
            owner: config.address.clone(),
            bin_values: BinarySet::new(),
            broadcasted_bvals: BinarySet::new(),
            est: BinaryState::new(),
            dec: BinaryState::new(),
            done: false,
            tryout_pending: false,
            supported_round: 0,
            bval_repo: [RequestRepository::new(), RequestRepository::new()],
            aux_repo: RequestRepository::new(),
            incoming: IncomingRequestRepository::new(),
            events: VecDeque::new(),
            broadcaster,
            coin,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn est(&self) -> Option<Binary> {
        self.est.value()
    }

    pub fn dec(&self) -> Option<Binary> {
        self.dec.value()
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn bin_values(&self) -> BinarySet {
        self.bin_values
    }

    pub fn status(&self) -> BbaStatus {
        BbaStatus {
            epoch: self.epoch,
            round: self.round,
            est: self.est(),
            dec: self.dec(),
            done: self.done,
        }
    }

    /// Set the round 0 estimate and vote for it
    pub fn handle_input(&mut self, value: Binary) -> Result<(), BbaError> {
        if self.done || self.round != 0 || !self.est.is_undefined() {
            return Err(BbaError::AlreadyProcessed(format!(
                "input at round {}, est {:?}",
                self.round,
                self.est.value()
            )));
        }

        self.est.set(value);
        info!(
            "[INPUT] owner: {}, epoch: {}, value: {}",
            self.owner, self.epoch, value
        );

        if !self.broadcasted_bvals.exist(value) {
            self.broadcasted_bvals.union(value);
            self.broadcast(BbaRequest::Bval(BvalRequest { value }))?;
        }
        self.process_events()
    }

    /// Decode and handle one inbound message
    ///
    /// After a decision, messages only prompt this member to vote its
    /// decision into rounds its peers have reached.
    pub fn handle_message(&mut self, sender: &Member, msg: BbaMessage) -> Result<(), BbaError> {
        let req = BbaRequest::decode(msg.kind, &msg.payload)?;

        if msg.epoch != self.epoch {
            warn!(
                "[EPOCH] owner: {}, expected: {}, got: {}",
                self.owner, self.epoch, msg.epoch
            );
            return Err(BbaError::EpochMismatch {
                expected: self.epoch,
                got: msg.epoch,
            });
        }
        if msg.round > self.round + MAX_FUTURE_ROUNDS {
            warn!(
                "[ROUND] owner: {}, dropped {:?} from {} for round {}, current {}",
                self.owner,
                req.kind(),
                sender,
                msg.round,
                self.round
            );
            return Err(BbaError::RoundTooFar {
                current: self.round,
                got: msg.round,
            });
        }
        if self.done {
            return self.support_decision(msg.round);
        }
        if msg.round < self.round {
            warn!(
                "[ROUND] owner: {}, stale {:?} from {} for round {}, current {}",
                self.owner,
                req.kind(),
                sender,
                msg.round,
                self.round
            );
            return Err(BbaError::StaleRound {
                current: self.round,
                got: msg.round,
            });
        }
        if msg.round > self.round {
            if self.incoming.save(msg.round, sender.clone(), req) {
                debug!(
                    "[ROUND] owner: {}, buffered {:?} from {} for round {}",
                    self.owner,
                    req.kind(),
                    sender,
                    msg.round
                );
            }
            return Ok(());
        }

        let result = self.handle_request(sender, req);
        self.process_events()?;
        result
    }

    fn handle_request(&mut self, sender: &Member, req: BbaRequest) -> Result<(), BbaError> {
        match req {
            BbaRequest::Bval(req) => self.handle_bval(sender, req),
            BbaRequest::Aux(req) => self.handle_aux(sender, req),
        }
    }

    fn handle_bval(&mut self, sender: &Member, req: BvalRequest) -> Result<(), BbaError> {
        let value = req.value;
        let repo = &mut self.bval_repo[value.as_bool() as usize];
        if !repo.save(sender, req) {
            return Err(BbaError::AlreadyProcessed(format!(
                "BVAL({value}) from {sender}"
            )));
        }

        let count = repo.len();
        debug!(
            "[BVAL] owner: {}, round: {}, sender: {}, value: {}, count: {}",
            self.owner, self.round, sender, value, count
        );

        if count == self.bval_amplify_threshold() && !self.broadcasted_bvals.exist(value) {
            self.broadcasted_bvals.union(value);
            self.broadcast(BbaRequest::Bval(BvalRequest { value }))?;
        }

        if count == self.bin_value_threshold() {
            let first = self.bin_values.is_empty();
            self.bin_values.union(value);
            self.events.push_back(Event::BinValueAdded {
                round: self.round,
                value,
                first,
            });
        }
        Ok(())
    }

    fn handle_aux(&mut self, sender: &Member, req: AuxRequest) -> Result<(), BbaError> {
        if !self.aux_repo.save(sender, req) {
            return Err(BbaError::AlreadyProcessed(format!(
                "AUX({}) from {sender}",
                req.value
            )));
        }
        debug!(
            "[AUX] owner: {}, round: {}, sender: {}, value: {}",
            self.owner, self.round, sender, req.value
        );

        self.check_tryout();
        Ok(())
    }

    fn process_events(&mut self) -> Result<(), BbaError> {
        while let Some(event) = self.events.pop_front() {
            match event {
                Event::BinValueAdded { round, value, first } if round == self.round => {
                    self.on_bin_value(value, first)?;
                }
                Event::TryoutAgreement { round } if round == self.round => {
                    self.tryout_agreement()?;
                }
                Event::AdvanceRound { round } if round == self.round => {
                    self.advance_round()?;
                }
                stale => debug!("[EVENT] owner: {}, dropped {:?}", self.owner, stale),
            }
        }
        Ok(())
    }

    fn on_bin_value(&mut self, value: Binary, first: bool) -> Result<(), BbaError> {
        info!(
            "[BIN] owner: {}, round: {}, bin values: {:?}",
            self.owner,
            self.round,
            self.bin_values.to_list()
        );

        if first {
            let aux = match self.est.value() {
                Some(est) if self.bin_values.exist(est) => est,
                _ => value,
            };
            self.broadcast(BbaRequest::Aux(AuxRequest { value: aux }))?;
            info!(
                "[AUX] owner: {}, round: {}, sent: {}",
                self.owner, self.round, aux
            );
        }

        // AUX votes recorded before this value joined now count
        self.check_tryout();
        Ok(())
    }

    fn check_tryout(&mut self) {
        if self.tryout_pending {
            return;
        }
        let count = self.count_aux();
        if count >= self.tryout_threshold() {
            self.tryout_pending = true;
            self.events.push_back(Event::TryoutAgreement { round: self.round });
        }
    }

    fn tryout_agreement(&mut self) -> Result<(), BbaError> {
        if self.done {
            return Ok(());
        }

        let values = self.bin_values.to_list();
        if values.is_empty() {
            error!(
                "[TRYOUT] owner: {}, epoch: {}, round: {}, bin values empty",
                self.owner, self.epoch, self.round
            );
            return Err(BbaError::InvariantViolation(format!(
                "bin values empty at tryout, epoch {} round {}",
                self.epoch, self.round
            )));
        }

        let coin = self.coin.coin(self.epoch, self.round);
        match values.as_slice() {
            [only] if *only == coin => {
                self.dec.set(*only);
                self.est.set(*only);
                self.done = true;
                info!(
                    "[DECIDE] owner: {}, epoch: {}, round: {}, value: {}",
                    self.owner, self.epoch, self.round, only
                );
            }
            [only] => self.est.set(*only),
            _ => self.est.set(coin),
        }

        debug!(
            "[TRYOUT] owner: {}, round: {}, coin: {}, est: {:?}",
            self.owner,
            self.round,
            coin,
            self.est.value()
        );
        self.events.push_back(Event::AdvanceRound { round: self.round });
        Ok(())
    }

    fn advance_round(&mut self) -> Result<(), BbaError> {
        self.round += 1;
        self.bin_values.clear();
        self.broadcasted_bvals.clear();
        for repo in &mut self.bval_repo {
            repo.clear();
        }
        self.aux_repo.clear();
        self.tryout_pending = false;
        self.incoming.prune_below(self.round);

        info!(
            "[ROUND] owner: {}, epoch: {}, advanced to {}, est: {:?}",
            self.owner,
            self.epoch,
            self.round,
            self.est.value()
        );

        let est = self.est.value().ok_or_else(|| {
            BbaError::InvariantViolation(format!("no estimate entering round {}", self.round))
        })?;
        self.broadcasted_bvals.union(est);
        self.broadcast(BbaRequest::Bval(BvalRequest { value: est }))?;

        if self.done {
            self.supported_round = self.round;
            return self.broadcast(BbaRequest::Aux(AuxRequest { value: est }));
        }
        for (sender, req) in self.incoming.take(self.round) {
            if let Err(e) = self.handle_request(&sender, req) {
                debug!("[ROUND] owner: {}, replay skipped: {}", self.owner, e);
            }
        }
        Ok(())
    }

    /// Vote BVAL and AUX for the decision in every round up to `round`,
    /// once per round
    fn support_decision(&mut self, round: u64) -> Result<(), BbaError> {
        let Some(dec) = self.dec.value() else {
            return Ok(());
        };

        while self.supported_round < round {
            self.supported_round += 1;
            let next = self.supported_round;
            debug!(
                "[SUPPORT] owner: {}, round: {}, value: {}",
                self.owner, next, dec
            );
            self.broadcast_at(BbaRequest::Bval(BvalRequest { value: dec }), next)?;
            self.broadcast_at(BbaRequest::Aux(AuxRequest { value: dec }), next)?;
        }
        Ok(())
    }

    fn broadcast(&self, req: BbaRequest) -> Result<(), BbaError> {
        self.broadcast_at(req, self.round)
    }

    fn broadcast_at(&self, req: BbaRequest, round: u64) -> Result<(), BbaError> {
        let msg = req.to_message(self.epoch, round)?;
        self.broadcaster
            .share_message(Message::new(self.owner.clone(), Payload::Bba(msg)));
        Ok(())
    }

    /// AUX votes for values currently in bin values
    fn count_aux(&self) -> usize {
        self.aux_repo
            .find_all()
            .filter(|req| self.bin_values.exist(req.value))
            .count()
    }

    fn bval_amplify_threshold(&self) -> usize {
        self.f + 1
    }

    fn bin_value_threshold(&self) -> usize {
        2 * self.f + 1
    }

    fn tryout_threshold(&self) -> usize {
        self.n - self.f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::BbaType;
    use agora_test_helpers::{members, FixedCoin, RecordingBroadcaster, ScriptedCoin};

    const EPOCH: u64 = 7;

    struct Fixture {
        members: Vec<Member>,
        outbox: Arc<RecordingBroadcaster>,
        state: BbaState,
    }

    /// Member 0's instance, n = 4
    fn fixture(coin: Arc<dyn CoinGenerator>) -> Fixture {
        let members = members(4);
        let outbox = Arc::new(RecordingBroadcaster::new());
        let state = BbaState::new(
            &Config::new(4, members[0].clone()),
            EPOCH,
            outbox.clone(),
            coin,
        )
        .unwrap();

        Fixture {
            members,
            outbox,
            state,
        }
    }

    fn bval(round: u64, value: Binary) -> BbaMessage {
        BbaRequest::Bval(BvalRequest { value })
            .to_message(EPOCH, round)
            .unwrap()
    }

    fn aux(round: u64, value: Binary) -> BbaMessage {
        BbaRequest::Aux(AuxRequest { value })
            .to_message(EPOCH, round)
            .unwrap()
    }

    /// (kind, round, value) of everything broadcast since the last call
    fn sent(outbox: &RecordingBroadcaster) -> Vec<(BbaType, u64, Binary)> {
        outbox
            .take()
            .into_iter()
            .filter_map(|m| match m.payload {
                Payload::Bba(msg) => {
                    let req = BbaRequest::decode(msg.kind, &msg.payload).ok()?;
                    Some((req.kind(), msg.round, req.value()))
                }
                Payload::Rbc(_) => None,
            })
            .collect()
    }

    fn deliver(f: &mut Fixture, senders: &[usize], msg: BbaMessage) {
        for &index in senders {
            let sender = f.members[index].clone();
            f.state.handle_message(&sender, msg.clone()).unwrap();
        }
    }

    #[test]
    fn test_input_broadcasts_bval() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        f.state.handle_input(Binary::One).unwrap();

        assert_eq!(f.state.est(), Some(Binary::One));
        assert_eq!(sent(&f.outbox), vec![(BbaType::Bval, 0, Binary::One)]);

        assert!(matches!(
            f.state.handle_input(Binary::Zero),
            Err(BbaError::AlreadyProcessed(_))
        ));
        assert_eq!(f.state.est(), Some(Binary::One));
    }

    #[test]
    fn test_single_round_decision() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        f.state.handle_input(Binary::One).unwrap();
        sent(&f.outbox);

        deliver(&mut f, &[0, 1], bval(0, Binary::One));
        assert!(f.state.bin_values().is_empty());

        deliver(&mut f, &[2], bval(0, Binary::One));
        assert_eq!(f.state.bin_values().to_list(), vec![Binary::One]);
        assert_eq!(sent(&f.outbox), vec![(BbaType::Aux, 0, Binary::One)]);

        deliver(&mut f, &[0, 1], aux(0, Binary::One));
        assert!(!f.state.done());

        deliver(&mut f, &[2], aux(0, Binary::One));
        assert!(f.state.done());
        assert_eq!(f.state.dec(), Some(Binary::One));
        assert_eq!(f.state.round(), 1);
        assert_eq!(
            sent(&f.outbox),
            vec![(BbaType::Bval, 1, Binary::One), (BbaType::Aux, 1, Binary::One)]
        );
    }

    #[test]
    fn test_coin_mismatch_advances_without_deciding() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::Zero)));
        f.state.handle_input(Binary::One).unwrap();

        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[0, 1, 2], aux(0, Binary::One));

        assert!(!f.state.done());
        assert_eq!(f.state.dec(), None);
        assert_eq!(f.state.round(), 1);
        assert_eq!(f.state.est(), Some(Binary::One));
        assert!(f.state.bin_values().is_empty());
    }

    #[test]
    fn test_two_bin_values_take_the_coin() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::Zero)));
        f.state.handle_input(Binary::One).unwrap();

        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[1, 2, 3], bval(0, Binary::Zero));
        assert_eq!(f.state.bin_values().len(), 2);

        deliver(&mut f, &[0, 1], aux(0, Binary::One));
        deliver(&mut f, &[2], aux(0, Binary::Zero));

        assert!(!f.state.done());
        assert_eq!(f.state.round(), 1);
        assert_eq!(f.state.est(), Some(Binary::Zero));
    }

    #[test]
    fn test_bval_amplification() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));

        deliver(&mut f, &[1], bval(0, Binary::Zero));
        assert!(sent(&f.outbox).is_empty());

        deliver(&mut f, &[2], bval(0, Binary::Zero));
        assert_eq!(sent(&f.outbox), vec![(BbaType::Bval, 0, Binary::Zero)]);

        // Count keeps climbing but the vote went out once
        deliver(&mut f, &[3], bval(0, Binary::Zero));
        assert_eq!(sent(&f.outbox), vec![(BbaType::Aux, 0, Binary::Zero)]);
    }

    #[test]
    fn test_aux_uses_estimate_in_bin_values() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        f.state.handle_input(Binary::Zero).unwrap();
        sent(&f.outbox);

        // One reaches bin values first, estimate zero is not a member
        deliver(&mut f, &[1, 2, 3], bval(0, Binary::One));
        let out = sent(&f.outbox);
        assert!(out.contains(&(BbaType::Aux, 0, Binary::One)));
    }

    #[test]
    fn test_duplicates_are_reported() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        let sender = f.members[1].clone();

        f.state.handle_message(&sender, bval(0, Binary::One)).unwrap();
        assert!(matches!(
            f.state.handle_message(&sender, bval(0, Binary::One)),
            Err(BbaError::AlreadyProcessed(_))
        ));

        // A BVAL for the other value is a separate vote
        f.state.handle_message(&sender, bval(0, Binary::Zero)).unwrap();

        f.state.handle_message(&sender, aux(0, Binary::One)).unwrap();
        assert!(matches!(
            f.state.handle_message(&sender, aux(0, Binary::Zero)),
            Err(BbaError::AlreadyProcessed(_))
        ));
    }

    #[test]
    fn test_undefined_tag() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        let mut msg = bval(0, Binary::One);
        msg.kind = 5;

        assert!(matches!(
            f.state.handle_message(&f.members[1].clone(), msg),
            Err(BbaError::UndefinedRequestType(5))
        ));
    }

    #[test]
    fn test_epoch_mismatch() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        let mut msg = bval(0, Binary::One);
        msg.epoch = EPOCH + 1;

        assert!(matches!(
            f.state.handle_message(&f.members[1].clone(), msg),
            Err(BbaError::EpochMismatch { expected: EPOCH, got }) if got == EPOCH + 1
        ));
    }

    #[test]
    fn test_future_round_is_replayed() {
        let coin = ScriptedCoin::new(Binary::One).with(EPOCH, 0, Binary::Zero);
        let mut f = fixture(Arc::new(coin));
        f.state.handle_input(Binary::One).unwrap();

        // Round 1 traffic arrives early
        deliver(&mut f, &[1, 2, 3], bval(1, Binary::One));
        deliver(&mut f, &[1, 2], aux(1, Binary::One));
        assert_eq!(f.state.round(), 0);

        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[0, 1, 2], aux(0, Binary::One));

        // Round 0 misses on the coin; the buffered round 1 votes plus our
        // own AUX finish round 1
        deliver(&mut f, &[0], aux(1, Binary::One));
        assert!(f.state.done());
        assert_eq!(f.state.dec(), Some(Binary::One));
        assert!(f.state.round() >= 2);
    }

    #[test]
    fn test_stale_round() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::Zero)));
        f.state.handle_input(Binary::One).unwrap();
        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[0, 1, 2], aux(0, Binary::One));
        assert_eq!(f.state.round(), 1);

        assert!(matches!(
            f.state.handle_message(&f.members[3].clone(), bval(0, Binary::One)),
            Err(BbaError::StaleRound { current: 1, got: 0 })
        ));
    }

    #[test]
    fn test_empty_bin_values_at_tryout_is_fatal() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));

        let err = f.state.tryout_agreement().unwrap_err();
        assert!(matches!(err, BbaError::InvariantViolation(_)));
        assert!(err.is_fatal());
        assert!(!f.state.done());
    }

    #[test]
    fn test_decision_is_final() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        f.state.handle_input(Binary::One).unwrap();
        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[0, 1, 2], aux(0, Binary::One));
        assert_eq!(f.state.dec(), Some(Binary::One));
        sent(&f.outbox);

        // Later traffic is acknowledged but changes nothing
        deliver(&mut f, &[0, 1, 2, 3], bval(1, Binary::Zero));
        deliver(&mut f, &[0, 1, 2, 3], aux(1, Binary::Zero));
        deliver(&mut f, &[3], bval(0, Binary::Zero));

        assert!(f.state.done());
        assert_eq!(f.state.dec(), Some(Binary::One));
        assert_eq!(f.state.round(), 1);
        assert!(sent(&f.outbox).is_empty());
        assert!(f.state.handle_input(Binary::Zero).is_err());
    }

    #[test]
    fn test_decided_member_votes_into_later_rounds() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        f.state.handle_input(Binary::One).unwrap();
        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[0, 1, 2], aux(0, Binary::One));
        sent(&f.outbox);

        deliver(&mut f, &[1], bval(2, Binary::Zero));
        assert_eq!(
            sent(&f.outbox),
            vec![(BbaType::Bval, 2, Binary::One), (BbaType::Aux, 2, Binary::One)]
        );

        deliver(&mut f, &[2], aux(2, Binary::One));
        assert!(sent(&f.outbox).is_empty());
        assert_eq!(f.state.round(), 1);
        assert_eq!(f.state.dec(), Some(Binary::One));
    }

    #[test]
    fn test_late_bin_value_recounts_aux() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));

        // AUX votes for one arrive before one is in bin values
        deliver(&mut f, &[1, 2, 3], aux(0, Binary::One));
        assert_eq!(f.state.round(), 0);

        deliver(&mut f, &[1, 2, 3], bval(0, Binary::One));
        assert!(f.state.done());
        assert_eq!(f.state.dec(), Some(Binary::One));
    }

    #[test]
    fn test_far_future_rounds_are_not_buffered() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        let sender = f.members[3].clone();

        for round in 1..=10_000 {
            let _ = f.state.handle_message(&sender, bval(round, Binary::One));
            let _ = f.state.handle_message(&sender, aux(round, Binary::Zero));
        }
        assert_eq!(f.state.incoming.len(), 2 * MAX_FUTURE_ROUNDS as usize);

        let err = f
            .state
            .handle_message(&sender, bval(MAX_FUTURE_ROUNDS + 1, Binary::One))
            .unwrap_err();
        assert!(matches!(err, BbaError::RoundTooFar { current: 0, got } if got == MAX_FUTURE_ROUNDS + 1));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_decided_member_fills_skipped_rounds() {
        let mut f = fixture(Arc::new(FixedCoin(Binary::One)));
        f.state.handle_input(Binary::One).unwrap();
        deliver(&mut f, &[0, 1, 2], bval(0, Binary::One));
        deliver(&mut f, &[0, 1, 2], aux(0, Binary::One));
        sent(&f.outbox);

        // A far round neither moves the support mark nor triggers votes
        let far = bval(1 + MAX_FUTURE_ROUNDS + 1, Binary::Zero);
        let sender = f.members[3].clone();
        assert!(f.state.handle_message(&sender, far).is_err());
        assert!(sent(&f.outbox).is_empty());

        deliver(&mut f, &[2], aux(3, Binary::Zero));
        assert_eq!(
            sent(&f.outbox),
            vec![
                (BbaType::Bval, 2, Binary::One),
                (BbaType::Aux, 2, Binary::One),
                (BbaType::Bval, 3, Binary::One),
                (BbaType::Aux, 3, Binary::One),
            ]
        );
    }
}
