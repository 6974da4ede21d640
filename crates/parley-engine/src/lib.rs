//! Per-call conversation engine: turns carrier webhooks into NCCO replies.

pub mod events;
pub mod generator;
pub mod history;
pub mod lifecycle;
pub mod ncco;
pub mod normalizer;
pub mod session;

pub use events::{CallEvent, DtmfPayload, InputEvent, SpeechPayload, SpeechResult};
pub use generator::{GenerationError, GeneratorConfig, ResponseGenerator};
pub use history::ConversationHistory;
pub use lifecycle::CallController;
pub use ncco::{CallbackBase, Decision, Instruction, InstructionBuilder};
pub use normalizer::{normalize, Normalized};
pub use session::{CallPhase, Session, SessionHandle, SessionStore};
