use futures_core::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use tributary_core::prelude::*;

use crate::bus::TokioReaderBus;

/// The notifications of a spawned reader. Ends once the reader stops or faults.
pub type NotificationStream = Pin<Box<dyn Stream<Item = ReaderNotification> + Send>>;

/// Errors returned by a [`ReaderHandle`].
#[derive(Debug, thiserror::Error)]
pub enum ReaderHandleError {
    /// The reader rejected the request.
    #[error(transparent)]
    Reader(#[from] ReaderError),
    /// The reader task has finished.
    #[error("Reader {0} is no longer running")]
    Disconnected(ReaderId),
    /// The reader task panicked.
    #[error("Reader task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Pause,
    Resume,
    ResumeFrom(u64),
    Stop,
    State,
}

#[derive(Debug)]
struct Command {
    request: Request,
    reply: oneshot::Sender<Result<ReaderState, ReaderError>>,
}

/// Controls a reader running on its own tokio task.
///
/// Dropping the handle stops the reader.
#[derive(Debug)]
pub struct ReaderHandle {
    reader_id: ReaderId,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    /// The id stamped on the reader's notifications.
    pub fn reader_id(&self) -> ReaderId {
        self.reader_id
    }

    /// Pauses the reader and returns its new state.
    pub async fn pause(&self) -> Result<ReaderState, ReaderHandleError> {
        self.send(Request::Pause).await
    }

    /// Resumes a paused reader and returns its new state.
    pub async fn resume(&self) -> Result<ReaderState, ReaderHandleError> {
        self.send(Request::Resume).await
    }

    /// Resumes a paused reader from `event_number` and returns its new state.
    pub async fn resume_from(&self, event_number: u64) -> Result<ReaderState, ReaderHandleError> {
        self.send(Request::ResumeFrom(event_number)).await
    }

    /// Stops the reader. Its notification stream ends once everything published so far has
    /// been consumed.
    pub async fn stop(&self) -> Result<ReaderState, ReaderHandleError> {
        self.send(Request::Stop).await
    }

    /// The reader's current state.
    pub async fn state(&self) -> Result<ReaderState, ReaderHandleError> {
        self.send(Request::State).await
    }

    /// Returns whether the reader task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Waits for the reader task to finish.
    pub async fn join(self) -> Result<(), ReaderHandleError> {
        self.task
            .await
            .map_err(|e| ReaderHandleError::Panicked(e.to_string()))
    }

    async fn send(&self, request: Request) -> Result<ReaderState, ReaderHandleError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { request, reply })
            .map_err(|_| ReaderHandleError::Disconnected(self.reader_id))?;
        let state = response
            .await
            .map_err(|_| ReaderHandleError::Disconnected(self.reader_id))??;
        Ok(state)
    }
}

/// Starts a reader of `stream_id` from `from_event_number` on a new tokio task.
///
/// Must be called from within a tokio runtime.
pub fn spawn_reader<G>(
    gateway: Arc<G>,
    stream_id: impl Into<String>,
    from_event_number: u64,
    config: ReaderConfig,
) -> Result<(ReaderHandle, NotificationStream), ReaderHandleError>
where
    G: LogReadGateway + 'static,
{
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let bus = TokioReaderBus::new(gateway, inbox_tx, notifications_tx);
    let mut reader = StreamEventReader::new(stream_id, config, bus);
    let reader_id = reader.reader_id();
    reader.start(from_event_number)?;

    let task = tokio::spawn(run(reader, inbox_rx, commands_rx));
    log::info!("Spawned {}", reader_id);

    Ok((
        ReaderHandle {
            reader_id,
            commands: commands_tx,
            task,
        },
        Box::pin(UnboundedReceiverStream::new(notifications_rx)),
    ))
}

async fn run<G>(
    mut reader: StreamEventReader<TokioReaderBus<G>>,
    mut inbox: mpsc::UnboundedReceiver<ReaderMessage>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    G: LogReadGateway + 'static,
{
    let reader_id = reader.reader_id();
    loop {
        tokio::select! {
            Some(message) = inbox.recv() => {
                if let Err(e) = reader.handle(message) {
                    log::warn!("{} rejected a message: {}", reader_id, e);
                }
            }
            command = commands.recv() => {
                let Some(Command { request, reply }) = command else {
                    log::debug!("Handle of {} dropped, stopping", reader_id);
                    reader.stop();
                    break;
                };
                let _ = reply.send(apply(&mut reader, request));
            }
        }
        if reader.state().is_terminal() {
            break;
        }
    }
    log::info!("{} finished in state {:?}", reader_id, reader.state());
    // cancels a pending timer and drops the notification sender, ending the consumer's stream
    reader.into_bus();
}

fn apply<G>(
    reader: &mut StreamEventReader<TokioReaderBus<G>>,
    request: Request,
) -> Result<ReaderState, ReaderError>
where
    G: LogReadGateway + 'static,
{
    match request {
        Request::Pause => reader.pause(),
        Request::Resume => reader.resume()?,
        Request::ResumeFrom(event_number) => reader.resume_from(event_number)?,
        Request::Stop => reader.stop(),
        Request::State => {}
    }
    Ok(reader.state())
}
