//! Tournament bracket engine: builds single and double elimination match
//! graphs, processes results with forward propagation, rolls back cascaded
//! outcomes, and broadcasts bracket snapshots to live subscribers.

pub mod broadcast;
pub mod builder;
pub mod error;
pub mod lifecycle;
pub mod live;
pub mod results;
pub mod rollback;
pub mod store;
pub mod types;

pub use broadcast::{Subscription, UpdateBroadcaster};
pub use builder::build_bracket;
pub use error::{EngineError, ErrorKind, Result};
pub use lifecycle::TournamentEngine;
pub use live::{LiveFeed, LiveUpdate};
pub use store::BracketStore;
pub use types::{
    Bracket, BracketKind, Match, MatchId, MatchStatus, Payout, Registration, RegistrationStatus,
    Round, Side, SlotRef, SlotSource, TeamId, TournamentStatus,
};
