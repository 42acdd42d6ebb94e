use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agora_core::{Broadcaster, Config, Member, RbcMessage};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::error::RbcError;
use crate::request::RbcRequest;
use crate::state::RbcState;

enum Command {
    MakeRequest {
        data: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<RbcRequest>, RbcError>>,
    },
    Message {
        sender: Member,
        msg: RbcMessage,
        reply: oneshot::Sender<Result<(), RbcError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a reliable broadcast instance running on its own task
///
/// Every call is queued to the worker and resolves once the worker has
/// processed it, so state changes happen in one linear order.
pub struct Rbc {
    proposer: Member,
    commands: mpsc::Sender<Command>,
    output: watch::Receiver<Option<Vec<u8>>>,
    closing: AtomicBool,
}

impl Rbc {
    /// Spawn an instance for `proposer`'s broadcast; needs a tokio runtime
    pub fn new(
        config: &Config,
        proposer: Member,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, RbcError> {
        let state = RbcState::new(config, proposer.clone(), broadcaster)?;
        let (commands, inbox) = mpsc::channel(config.channel_capacity);
        let (publish, output) = watch::channel(None);

        tokio::spawn(run(state, inbox, publish));

        Ok(Rbc {
            proposer,
            commands,
            output,
            closing: AtomicBool::new(false),
        })
    }

    pub fn proposer(&self) -> &Member {
        &self.proposer
    }

    /// Proposer only: shard `data` and return the VALs to distribute
    pub async fn make_request(&self, data: Vec<u8>) -> Result<Vec<RbcRequest>, RbcError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::MakeRequest { data, reply }).await?;
        response.await.map_err(|_| RbcError::Closed)?
    }

    pub async fn handle_message(&self, sender: Member, msg: RbcMessage) -> Result<(), RbcError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Message { sender, msg, reply }).await?;
        response.await.map_err(|_| RbcError::Closed)?
    }

    /// The delivered value, if any
    pub fn value(&self) -> Option<Vec<u8>> {
        self.output.borrow().clone()
    }

    /// Wait for delivery; `None` if the instance stops first
    pub async fn delivered(&self) -> Option<Vec<u8>> {
        let mut output = self.output.clone();
        let value = output.wait_for(Option::is_some).await.ok()?;
        value.clone()
    }

    /// Stop the worker; calls after the first return immediately
    pub async fn close(&self) {
        if self
            .closing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let (reply, ack) = oneshot::channel();
        if self.commands.send(Command::Close { reply }).await.is_ok() {
            let _ = ack.await;
        }
    }

    async fn send(&self, command: Command) -> Result<(), RbcError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(RbcError::Closed);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| RbcError::Closed)
    }
}

async fn run(
    mut state: RbcState,
    mut inbox: mpsc::Receiver<Command>,
    publish: watch::Sender<Option<Vec<u8>>>,
) {
    while let Some(command) = inbox.recv().await {
        match command {
            Command::MakeRequest { data, reply } => {
                let _ = reply.send(state.make_request(&data));
            }
            Command::Message { sender, msg, reply } => {
                let result = state.handle_message(&sender, msg);
                let _ = reply.send(result);
            }
            Command::Close { reply } => {
                debug!("RBC instance for {} closing", state.proposer());
                let _ = reply.send(());
                break;
            }
        }

        if publish.borrow().is_none() {
            if let Some(value) = state.value() {
                publish.send_replace(Some(value.to_vec()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_test_helpers::{members, RecordingBroadcaster};

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let members = members(4);
        let rbc = Rbc::new(
            &Config::new(4, members[0].clone()),
            members[0].clone(),
            Arc::new(RecordingBroadcaster::new()),
        )
        .unwrap();

        rbc.close().await;
        rbc.close().await;

        let ready = RbcRequest::Ready(crate::ReadyRequest {
            root_hash: agora_core::Hash::ZERO,
        });
        let msg = ready.to_message(&members[0], 8).unwrap();
        assert!(matches!(
            rbc.handle_message(members[1].clone(), msg).await,
            Err(RbcError::Closed)
        ));
        assert_eq!(rbc.value(), None);
    }

    #[tokio::test]
    async fn test_concurrent_close() {
        let members = members(4);
        let rbc = Rbc::new(
            &Config::new(4, members[0].clone()),
            members[0].clone(),
            Arc::new(RecordingBroadcaster::new()),
        )
        .unwrap();

        tokio::join!(rbc.close(), rbc.close());
        assert!(rbc.delivered().await.is_none());
    }

    #[tokio::test]
    async fn test_make_request_through_worker() {
        let members = members(4);
        let outbox = Arc::new(RecordingBroadcaster::new());
        let rbc = Rbc::new(
            &Config::new(4, members[0].clone()),
            members[0].clone(),
            outbox.clone(),
        )
        .unwrap();

        let vals = rbc.make_request(b"HELLO123".to_vec()).await.unwrap();
        assert_eq!(vals.len(), 3);
        assert_eq!(outbox.take().len(), 1);
    }

    #[test]
    fn test_config_error_is_fatal() {
        let members = members(2);
        let result = Rbc::new(
            &Config::new(2, members[0].clone()),
            members[0].clone(),
            Arc::new(RecordingBroadcaster::new()),
        );
        match result {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("two members cannot tolerate a fault"),
        }
    }
}
