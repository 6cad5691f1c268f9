//! # Tributary core
//!
//! The stream event reader of a projection engine: it pages forward through one stream of a
//! totally ordered commit log, republishes each event in order with the positional metadata a
//! downstream merge needs, and backs off on a timer once it has caught up.
//!
//! The reader performs no I/O itself. It talks to the outside world through a [`ReaderBus`]
//! and is driven by [`ReaderMessage`]s, which makes it straightforward to run inside any
//! executor, or step by step in tests.

#![deny(missing_docs)]

pub mod backoff;
pub mod bus;
pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod notification;
pub mod reader;
pub mod token;

pub use bus::{LogReadGateway, ReaderBus, TimerHandle};
pub use classify::{ReadClassification, classify};
pub use config::{BackoffPolicy, ReaderConfig};
pub use error::ReaderError;
pub use event::{EventRecord, EventRecordBuilder, EventRecordBuilderError, LogPosition, ResolvedEvent};
pub use message::{ReadForward, ReadStreamCompleted, ReadStreamResult, ReaderMessage};
pub use notification::{DistributedEvent, EventTarget, ReaderNotification};
pub use reader::{ReadCursor, ReaderState, StreamEventReader};
pub use token::{CorrelationToken, ReaderId};

pub mod prelude {
    //! The prelude module for the `tributary_core` crate.
    pub use super::{
        BackoffPolicy, CorrelationToken, DistributedEvent, EventRecord, EventTarget, LogPosition,
        LogReadGateway, ReadForward, ReadStreamCompleted, ReadStreamResult, ReaderBus,
        ReaderConfig, ReaderError, ReaderId, ReaderMessage, ReaderNotification, ReaderState,
        ResolvedEvent, StreamEventReader, TimerHandle,
    };
}
