//! Client session driver
//!
//! Runs one analysis session against the conversation server: clear the
//! record, issue the start call, then poll for messages and for the analysis
//! report until it arrives, the server stays silent too long, or too many
//! calls fail in a row.
//!
//! Same Elm-style split as the rest of the crate: [`transition`] is pure,
//! [`SessionDriver`] performs the effects it returns.

mod effect;
mod error;
mod event;
mod executor;
mod http;
mod scheduler;
mod state;
mod traits;
mod transition;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use effect::DriverEffect;
pub use error::ApiError;
pub use event::{DriverEvent, Timer};
pub use executor::{DriverCommand, SessionDriver};
pub use http::HttpConversationApi;
pub use scheduler::TokioScheduler;
pub use state::{
    ConfigError, Credentials, Notice, NoticeLevel, SessionConfig, SessionState, Stage, UserTone,
    MAX_USER_TONES,
};
pub use traits::{ConversationApi, Scheduler, TimerTick};
pub use transition::{
    transition, TransitionError, TransitionResult, INACTIVITY_MESSAGE, MAX_CONSECUTIVE_ERRORS,
};
