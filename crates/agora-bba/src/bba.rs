use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agora_core::{BbaMessage, Binary, Broadcaster, CoinGenerator, Config, Member};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

use crate::error::BbaError;
use crate::state::{BbaState, BbaStatus};

enum Command {
    Input {
        value: Binary,
        reply: oneshot::Sender<Result<(), BbaError>>,
    },
    Message {
        sender: Member,
        msg: BbaMessage,
        reply: oneshot::Sender<Result<(), BbaError>>,
    },
    Status {
        reply: oneshot::Sender<BbaStatus>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a binary agreement instance running on its own task
pub struct Bba {
    epoch: u64,
    commands: mpsc::Sender<Command>,
    output: watch::Receiver<Option<Binary>>,
    closing: AtomicBool,
}

impl Bba {
    /// Spawn the instance for `epoch`; needs a tokio runtime
    pub fn new(
        config: &Config,
        epoch: u64,
        broadcaster: Arc<dyn Broadcaster>,
        coin: Arc<dyn CoinGenerator>,
    ) -> Result<Self, BbaError> {
        let state = BbaState::new(config, epoch, broadcaster, coin)?;
        let (commands, inbox) = mpsc::channel(config.channel_capacity);
        let (publish, output) = watch::channel(None);

        tokio::spawn(run(state, inbox, publish));

        Ok(Bba {
            epoch,
            commands,
            output,
            closing: AtomicBool::new(false),
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub async fn handle_input(&self, value: Binary) -> Result<(), BbaError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Input { value, reply }).await?;
        response.await.map_err(|_| BbaError::Closed)?
    }

    pub async fn handle_message(&self, sender: Member, msg: BbaMessage) -> Result<(), BbaError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Message { sender, msg, reply }).await?;
        response.await.map_err(|_| BbaError::Closed)?
    }

    pub async fn status(&self) -> Result<BbaStatus, BbaError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        response.await.map_err(|_| BbaError::Closed)
    }

    /// The decided bit, if any
    pub fn result(&self) -> Option<Binary> {
        *self.output.borrow()
    }

    /// Wait for a decision; `None` if the instance stops first
    pub async fn decided(&self) -> Option<Binary> {
        let mut output = self.output.clone();
        let value = output.wait_for(Option::is_some).await.ok()?;
        *value
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

    async fn send(&self, command: Command) -> Result<(), BbaError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(BbaError::Closed);
        }
        self.commands
            .send(command)
            .await
            .map_err(|_| BbaError::Closed)
    }
}

async fn run(
    mut state: BbaState,
    mut inbox: mpsc::Receiver<Command>,
    publish: watch::Sender<Option<Binary>>,
) {
    while let Some(command) = inbox.recv().await {
        let result = match command {
            Command::Input { value, reply } => {
                let result = state.handle_input(value);
                let fatal = abort_reason(&result);
                let _ = reply.send(result);
                fatal
            }
            Command::Message { sender, msg, reply } => {
                let result = state.handle_message(&sender, msg);
                let fatal = abort_reason(&result);
                let _ = reply.send(result);
                fatal
            }
            Command::Status { reply } => {
                let _ = reply.send(state.status());
                None
            }
            Command::Close { reply } => {
                debug!("BBA instance for epoch {} closing", state.epoch());
                let _ = reply.send(());
                break;
            }
        };

        if publish.borrow().is_none() {
            if let Some(dec) = state.dec() {
                publish.send_replace(Some(dec));
            }
        }

        if let Some(reason) = result {
            error!(
                "BBA instance for epoch {} aborted: {}",
                state.epoch(),
                reason
            );
            break;
        }
    }
}

fn abort_reason(result: &Result<(), BbaError>) -> Option<String> {
    match result {
        Err(e) if e.is_fatal() => Some(e.to_string()),
        _ => None,
    }
}
