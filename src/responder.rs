//! Answer assembly: grounded prompt, provider call, citations, confidence

use crate::llm::{LmProvider, DEFAULT_STUB_ANSWER};
use crate::planner::PlannerDecision;
use crate::retriever::Retrieval;
use crate::store::RetrievedChunk;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Characters of chunk text carried into each citation snippet
const SNIPPET_CHARS: usize = 200;

/// Prefix of the degraded answer returned when the configured provider fails
pub const PROVIDER_UNAVAILABLE_PREFIX: &str = "Model provider unavailable; falling back to stub. ";

/// One source citation per retrieved chunk, in retrieval order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub chunk_id: String,
    pub score: f32,
    pub title: String,
    pub snippet: String,
}

/// Full response to one question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub planner: PlannerDecision,
    pub latency_ms: u64,
    pub provider: String,
    pub confidence: f32,
    pub question: String,
}

/// Assembles the grounded prompt and calls the language model
pub struct Responder {
    provider: Arc<dyn LmProvider>,
    /// Provider the deployment configured; kept in the response even when the
    /// answer had to degrade to the stub
    configured: String,
}

impl Responder {
    pub fn new(provider: Arc<dyn LmProvider>, configured: String) -> Self {
        Self {
            provider,
            configured,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        decision: &PlannerDecision,
        retrieval: &Retrieval,
        started: Instant,
    ) -> AskResponse {
        let answer = self.generate_answer(question, &retrieval.chunks).await;
        let citations = retrieval.chunks.iter().map(citation).collect();
        let scores: Vec<f32> = retrieval.chunks.iter().map(|c| c.score).collect();

        let mut planner = decision.clone();
        planner.reasons.extend(retrieval.notes.iter().cloned());

        AskResponse {
            answer,
            citations,
            planner,
            latency_ms: started.elapsed().as_millis() as u64,
            provider: self.configured.clone(),
            confidence: confidence(&scores),
            question: question.to_string(),
        }
    }

    async fn generate_answer(&self, question: &str, chunks: &[RetrievedChunk]) -> String {
        if self.configured == "stub" {
            return DEFAULT_STUB_ANSWER.to_string();
        }
        if self.provider.name() == "stub" {
            // a real provider was configured but the stub was installed at startup
            return format!("{PROVIDER_UNAVAILABLE_PREFIX}{DEFAULT_STUB_ANSWER}");
        }

        let prompt = build_prompt(question, chunks);
        match self.provider.generate(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(provider = %self.configured, "provider returned an empty answer");
                format!("{PROVIDER_UNAVAILABLE_PREFIX}{DEFAULT_STUB_ANSWER}")
            }
            Err(e) => {
                warn!(provider = %self.configured, error = %e, "provider failed; degrading to stub answer");
                format!("{PROVIDER_UNAVAILABLE_PREFIX}{DEFAULT_STUB_ANSWER}")
            }
        }
    }
}

/// Fixed service-desk prompt: answer only from the enumerated context and
/// cite sources as `[doc_id:chunk_id]`.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(
        "You are a service-desk assistant. Answer the question using only the \
         provided context. Cite sources inline as [doc_id:chunk_id]. If the \
         context does not contain the answer, say that plainly.\n\nContext:\n",
    );

    for (i, chunk) in chunks.iter().enumerate() {
        let label = if chunk.metadata.title.trim().is_empty() {
            &chunk.metadata.doc_id
        } else {
            &chunk.metadata.title
        };
        prompt.push_str(&format!("[{i}] ({label})\n{}\n", chunk.text));
    }

    prompt.push_str(&format!("\nQuestion: {question}\n"));
    prompt
}

fn citation(chunk: &RetrievedChunk) -> Citation {
    Citation {
        doc_id: chunk.metadata.doc_id.clone(),
        chunk_id: chunk.id.clone(),
        score: chunk.score,
        title: chunk.metadata.title.clone(),
        snippet: chunk.text.chars().take(SNIPPET_CHARS).collect(),
    }
}

/// Monotone-in-closeness confidence: `clamp(1 / (1 + mean(scores)), 0.1, 0.99)`
/// when at least one score exists, `0.5` otherwise.
pub fn confidence(scores: &[f32]) -> f32 {
    if scores.is_empty() {
        return 0.5;
    }
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    (1.0 / (1.0 + mean)).clamp(0.1, 0.99)
}
