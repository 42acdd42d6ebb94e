//! Test fixtures shared by the broadcast and agreement crates

use std::collections::HashMap;
use std::sync::Mutex;

use agora_core::{Binary, Broadcaster, CoinGenerator, Member, Message};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// `n` members on localhost, ports 9000 upwards
pub fn members(n: usize) -> Vec<Member> {
    (0..n)
        .map(|i| Member::new("127.0.0.1", 9000 + i as u16))
        .collect()
}

/// Install a test-friendly subscriber honouring `RUST_LOG`; safe to call twice
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Broadcaster that keeps every message until a test drains it
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    messages: Mutex<Vec<Message>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything broadcast so far
    pub fn take(&self) -> Vec<Message> {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *messages)
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn share_message(&self, message: Message) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
    }
}

/// Coin that always shows the same face
#[derive(Debug, Clone, Copy)]
pub struct FixedCoin(pub Binary);

impl CoinGenerator for FixedCoin {
    fn coin(&self, _epoch: u64, _round: u64) -> Binary {
        self.0
    }
}

/// Coin with chosen faces for chosen rounds and a default elsewhere
#[derive(Debug, Clone)]
pub struct ScriptedCoin {
    faces: HashMap<(u64, u64), Binary>,
    default: Binary,
}

impl ScriptedCoin {
    pub fn new(default: Binary) -> Self {
        ScriptedCoin {
            faces: HashMap::new(),
            default,
        }
    }

    pub fn with(mut self, epoch: u64, round: u64, face: Binary) -> Self {
        self.faces.insert((epoch, round), face);
        self
    }
}

impl CoinGenerator for ScriptedCoin {
    fn coin(&self, epoch: u64, round: u64) -> Binary {
        self.faces
            .get(&(epoch, round))
            .copied()
            .unwrap_or(self.default)
    }
}

/// Deterministic pseudo-random coin shared by every member using one seed
#[derive(Debug, Clone, Copy)]
pub struct SeededCoin {
    seed: u64,
}

impl SeededCoin {
    pub fn new(seed: u64) -> Self {
        SeededCoin { seed }
    }
}

impl CoinGenerator for SeededCoin {
    fn coin(&self, epoch: u64, round: u64) -> Binary {
        let mixed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(epoch.rotate_left(32) ^ round);
        let mut rng = StdRng::seed_from_u64(mixed);
        Binary::from(rng.gen_bool(0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{BbaMessage, Payload};

    #[test]
    fn test_recording_broadcaster_drains() {
        let outbox = RecordingBroadcaster::new();
        let sender = members(1).remove(0);
        outbox.share_message(Message::new(
            sender,
            Payload::Bba(BbaMessage {
                epoch: 0,
                round: 0,
                kind: 0,
                payload: vec![],
            }),
        ));

        assert_eq!(outbox.take().len(), 1);
        assert!(outbox.take().is_empty());
    }

    #[test]
    fn test_coins() {
        let scripted = ScriptedCoin::new(Binary::One).with(0, 1, Binary::Zero);
        assert_eq!(scripted.coin(0, 0), Binary::One);
        assert_eq!(scripted.coin(0, 1), Binary::Zero);

        let seeded = SeededCoin::new(7);
        assert_eq!(seeded.coin(3, 4), SeededCoin::new(7).coin(3, 4));
        assert_eq!(FixedCoin(Binary::Zero).coin(9, 9), Binary::Zero);
    }
}
