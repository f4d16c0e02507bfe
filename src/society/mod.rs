//! Role-playing society: a user agent instructs, an assistant agent solves.

pub mod prompts;
pub mod role_playing;

pub use prompts::{FINAL_ANSWER_PREFIX, TASK_DONE};
pub use role_playing::{ChatTurn, RolePlaying, SocietyOutcome, Termination, DEFAULT_ROUND_LIMIT};
