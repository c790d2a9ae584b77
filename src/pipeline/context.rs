//! Retrieval glue: query the user-story index and condense the hits into
//! a cited answer used as context for the assignment stage.

use tracing::{debug, info, warn};

use super::prompts::{fill, CITATION_QA, FIND_CONTEXT};
use crate::api::{LanguageModel, Retriever, ScoredNode};
use crate::error::PipelineError;

pub fn context_query(microservices_list: &str, user_stories: &str, specs: &str) -> String {
    fill(
        FIND_CONTEXT,
        &[
            ("microservices_list", microservices_list),
            ("user_stories", user_stories),
            ("specs", specs),
        ],
    )
}

/// Number retrieved chunks as `Source 1:`, `Source 2:`, ... for citation.
pub fn format_sources(nodes: &[ScoredNode]) -> String {
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| format!("Source {}:\n{}", i + 1, node.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Retrieve supporting context for `query`.
///
/// An empty retrieval yields an empty context without calling the model.
pub async fn retrieve_context(
    model: &dyn LanguageModel,
    retriever: &dyn Retriever,
    query: &str,
) -> Result<String, PipelineError> {
    let nodes = retriever.retrieve(query).await?;
    if nodes.is_empty() {
        warn!("Retriever returned no sources; continuing without context");
        return Ok(String::new());
    }

    for (i, node) in nodes.iter().enumerate() {
        debug!("Source {} score {:.3}", i + 1, node.score);
    }

    let prompt = fill(
        CITATION_QA,
        &[("context_str", &format_sources(&nodes)), ("query_str", query)],
    );
    let answer = model.complete(&prompt).await?;
    info!("📚 Retrieved context from {} sources", nodes.len());
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticRetriever(Vec<ScoredNode>);

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<ScoredNode>, PipelineError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for CountingModel {
        async fn complete(&self, prompt: &str) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("Source 1:\nAs a user I log in"));
            assert!(prompt.contains("Query: which patterns?"));
            Ok("  Use a saga (Source 1).  ".to_string())
        }
    }

    fn node(text: &str) -> ScoredNode {
        ScoredNode {
            text: text.to_string(),
            score: 0.5,
        }
    }

    #[test]
    fn test_format_sources_numbers_from_one() {
        let out = format_sources(&[node("a"), node(" b\n")]);
        assert_eq!(out, "Source 1:\na\n\nSource 2:\nb");
    }

    #[test]
    fn test_context_query_fills_every_slot() {
        let query = context_query("[auth]", "1) login", "a shop");
        assert!(query.contains("microservices list [auth] given these user stories: 1) login"));
        assert!(query.contains("descriptions:a shop?"));
    }

    #[tokio::test]
    async fn test_retrieve_context_cites_sources() {
        let model = CountingModel::default();
        let retriever = StaticRetriever(vec![node("As a user I log in")]);
        let context = retrieve_context(&model, &retriever, "which patterns?")
            .await
            .unwrap();
        assert_eq!(context, "Use a saga (Source 1).");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_retrieval_skips_model() {
        let model = CountingModel::default();
        let retriever = StaticRetriever(Vec::new());
        let context = retrieve_context(&model, &retriever, "q").await.unwrap();
        assert!(context.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }
}
