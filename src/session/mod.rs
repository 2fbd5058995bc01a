//! Session Registry
//!
//! Room state and lifecycle:
//!
//! - **types**: Core data structures (Session, Participant, SessionSnapshot)
//! - **registry**: The registry owning all live rooms
//! - **presence**: Roster projection embedded in outbound events
//! - **sink**: Send capability stored per participant
//! - **error**: Error types
//!
//! # Lifecycle
//!
//! ```text
//! create / first join → mutate (text, language, join, leave) → delete
//!                                                 ↑
//!        explicit delete | empty + grace expiry | idle sweep
//! ```

pub mod error;
pub mod presence;
pub mod registry;
pub mod sink;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use presence::{roster, ParticipantInfo};
pub use registry::SessionRegistry;
pub use sink::{Frame, MessageSink, SinkError};
pub use types::{
    generate_participant_id, generate_room_id, now_millis, Participant, ParticipantId,
    RegistryConfig, Session, SessionId, SessionSnapshot, ANONYMOUS,
};
