//! Query orchestration: retrieval, prompt assembly, generation, and
//! conversation commit.
//!
//! [`QueryEngine`] owns the collaborators and the session store. For a
//! session-scoped question the session lock is held across the whole
//! retrieve-generate-commit span, so two concurrent questions on one
//! session cannot interleave their history. History is committed only
//! after generation succeeds; a failed turn leaves the conversation as it
//! was.

use anyhow::{ensure, Result};
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::generation::Generator;
use crate::index::Index;
use crate::models::Exchange;
use crate::retrieve::retrieve;
use crate::session::{RetrievalOptions, SessionStore};

/// Canned response when retrieval finds nothing. The generator is not
/// called and the turn is not recorded in session history.
pub const NO_MATCH_RESPONSE: &str = "Unable to find matching results.";

/// A completed answer with the deduplicated sources that informed it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    pub sources: Vec<String>,
}

pub struct QueryEngine {
    index: Arc<dyn Index>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    sessions: SessionStore,
}

impl QueryEngine {
    pub fn new(
        index: Arc<dyn Index>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        default_retrieval: RetrievalOptions,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            sessions: SessionStore::new(default_retrieval),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer `question`, optionally within the session named by
    /// `session_id`. `top_k` overrides the default for sessionless queries
    /// only; a session keeps the retrieval options it was created with.
    pub async fn answer(
        &self,
        session_id: Option<&str>,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<Answer> {
        let question = question.trim();
        ensure!(!question.is_empty(), "question must not be empty");

        match session_id {
            Some(id) => {
                let session = self.sessions.session(id);
                let mut state = session.lock().await;
                let k = state.retrieval.top_k;

                let retrieved =
                    retrieve(self.index.as_ref(), self.embedder.as_ref(), question, k).await?;
                if retrieved.is_empty() {
                    return Ok(no_match());
                }

                let prompt = build_prompt(&retrieved.context, &state.history, question);
                let response = self.generator.generate(&prompt).await?;
                state.push(question.to_string(), response.clone());

                Ok(Answer {
                    response,
                    sources: retrieved.sources,
                })
            }
            None => {
                let k = top_k.unwrap_or(self.sessions.default_retrieval().top_k);
                let retrieved =
                    retrieve(self.index.as_ref(), self.embedder.as_ref(), question, k).await?;
                if retrieved.is_empty() {
                    return Ok(no_match());
                }

                let prompt = build_prompt(&retrieved.context, &[], question);
                let response = self.generator.generate(&prompt).await?;

                Ok(Answer {
                    response,
                    sources: retrieved.sources,
                })
            }
        }
    }
}

fn no_match() -> Answer {
    Answer {
        response: NO_MATCH_RESPONSE.to_string(),
        sources: Vec::new(),
    }
}

/// Assemble the generation prompt: context block, prior conversation (when
/// any), then the question.
pub fn build_prompt(context: &str, history: &[Exchange], question: &str) -> String {
    let mut prompt = format!(
        "Answer the question based only on the following context:\n\n{context}\n\n---\n\n"
    );

    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for exchange in history {
            prompt.push_str(&format!("Q: {}\nA: {}\n", exchange.question, exchange.answer));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Answer the question based on the above context: {question}"
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_without_history() {
        let prompt = build_prompt("chunk one\n\n---\n\nchunk two", &[], "What happened?");
        assert!(prompt.starts_with("Answer the question based only on the following context:"));
        assert!(prompt.contains("chunk one"));
        assert!(prompt.contains("chunk two"));
        assert!(prompt.ends_with("Answer the question based on the above context: What happened?"));
        assert!(!prompt.contains("Conversation so far:"));
    }

    #[test]
    fn prompt_includes_prior_exchanges_in_order() {
        let history = vec![
            Exchange {
                question: "first q".to_string(),
                answer: "first a".to_string(),
            },
            Exchange {
                question: "second q".to_string(),
                answer: "second a".to_string(),
            },
        ];
        let prompt = build_prompt("ctx", &history, "third q");
        let first = prompt.find("Q: first q").unwrap();
        let second = prompt.find("Q: second q").unwrap();
        assert!(first < second);
        assert!(prompt.contains("A: first a"));
        assert!(prompt.ends_with("third q"));
    }
}
