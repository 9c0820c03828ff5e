//! Terminal client for the MedAssist assistant server.
//!
//! Sends chat turns with a rolling context, attaches an optional user
//! profile to outgoing prompts, and uploads or lists documents.

pub mod assistant;
pub mod commands;
pub mod config;
pub mod documents;
pub mod error;
pub mod history;
pub mod profile;
pub mod session;
pub mod slash;
pub mod storage;
pub mod types;

pub use assistant::{AssistantReply, AssistantRequest, HttpAssistant, RemoteAssistant};
pub use config::Config;
pub use documents::{DocumentStore, HttpDocumentStore, UploadRequest, UploadedFile};
pub use error::{ChatError, StoreError, UploadError};
pub use history::MessageList;
pub use profile::{Profile, ProfileField};
pub use session::{ConversationSession, PendingTurn, SessionState, TurnOutcome};
pub use storage::{JsonFileStore, MemoryStore, SessionStore, StorageManager};
pub use types::{Context, ContextEntry, Message, MessageId, Role, Sender};
