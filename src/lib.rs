#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]

//! `replyforge` — persona-conditioned reply-comment generation with a
//! compliance pipeline.
//!
//! The crate takes a source post, an author fingerprint, a commercial-intent
//! mode and a product catalog, and produces three reply variants (short,
//! medium, long) through generation, rule-based + assisted review, targeted
//! editing and a bounded per-variant fix loop. The text-generation backend
//! is injected behind [`backend::GenerationBackend`]; everything else is
//! deterministic and side-effect-free.

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod prompt;

pub use backend::{ChatMessage, ChatRole, GenerationBackend};
pub use error::{BackendError, ForgeError, PromptError};
pub use pipeline::{
    AuthorProfile, CommentPipeline, CommentRequest, DraftSet, FinalizeOptions, Language, Mode,
    PromptTrack, Variant,
};
pub use prompt::PromptSet;
