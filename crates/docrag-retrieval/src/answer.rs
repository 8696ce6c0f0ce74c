use serde::Serialize;

use crate::service::RetrievedChunk;

/// Payload for the answer-synthesis step: the question, the retrieved
/// context and the sources to cite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerContext {
    pub question: String,
    /// Chunk texts in rank order, separated by a blank line.
    pub context: String,
    /// Distinct sources in rank order.
    pub citations: Vec<String>,
}

impl AnswerContext {
    pub fn from_hits(question: impl Into<String>, hits: &[RetrievedChunk]) -> Self {
        let context = hits.iter().map(|h| h.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let mut citations: Vec<String> = Vec::new();
        for hit in hits {
            if !citations.contains(&hit.source) {
                citations.push(hit.source.clone());
            }
        }
        Self { question: question.into(), context, citations }
    }

    /// Grounding prompt for a chat model.
    pub fn to_prompt(&self) -> String {
        format!(
            "You are a knowledge-base assistant. Answer the question using only the following content.\n\
             Content:\n{}\n\nQuestion: {}\n",
            self.context, self.question
        )
    }
}
