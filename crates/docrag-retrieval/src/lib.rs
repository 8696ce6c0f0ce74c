//! Query path: embed a question, search a loaded index, and shape the hits
//! into the payload handed to answer synthesis.

pub mod answer;
pub mod service;

pub use answer::AnswerContext;
pub use service::{RetrievalService, RetrievedChunk, DEFAULT_K};
