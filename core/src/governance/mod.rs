//! The governance half of the crate (spec.md §3-4): the per-topic audit
//! chain, the vote session state machine built on top of it, the
//! notification boundary, the reminder scheduler, and on-disk persistence.

pub mod block;
pub mod chain;
pub mod notify;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod types;

pub use block::{Block, BlockPayload, BlockType, PartialBlock};
pub use chain::{Chain, ChainIntegrityError, ChainSnapshot, ChainVerification, batch_vote_hash, session_hash, verify_blocks};
pub use notify::{InMemoryNotificationSink, NotificationEvent, NotificationEventType, NotificationSink};
pub use scheduler::{ReminderSchedule, ReminderTick, compute_ticks};
pub use session::{CanFinalize, SessionStateError, SessionStatus, VotingSession};
pub use storage::{BlockchainIndex, GovStorage, VoteRecord};
pub use types::{ProposalResult, ProposalStatus, ProposalVote, ResultData, Timestamp, VoteData};
