// 8.0: market facade. every public operation loads a context, settles whatever the
// oracle has reached, applies the action, moves collateral and commits. no state is
// written on any error path.

mod admin;
mod config;
mod context;
mod core;
mod fees;
mod guard;
mod intents;
mod results;
mod settlement;
mod update;

pub use config::{EngineConfig, EventEcho};
pub use core::{Collaborators, Engine};
pub use guard::{GuardToken, ReentrancyGuard};
pub use results::{EngineError, ErrorCategory, IntentOutcome, LiquidationQuote, SettleOutcome, UpdateOutcome};
pub use update::UpdateRequest;
