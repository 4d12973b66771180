//! Prompt templates for answer generation and judging.

/// Marker placed between context chunks sent to the judge.
///
/// Log and console readers count chunks by this marker, so its text must stay stable.
pub const CHUNK_SEPARATOR: &str = "--- CHUNK SEPARATOR ---";

/// At most this many chunks are submitted to the judge.
pub const MAX_JUDGE_CHUNKS: usize = 5;

/// Join up to [`MAX_JUDGE_CHUNKS`] chunks, in rank order, with the separator marker.
pub fn join_chunks<S: AsRef<str>>(chunks: &[S]) -> String {
    let separator = format!("\n\n{}\n\n", CHUNK_SEPARATOR);
    chunks
        .iter()
        .take(MAX_JUDGE_CHUNKS)
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Number of chunks in a joined context string.
pub fn count_chunks(context: &str) -> usize {
    if context.is_empty() {
        0
    } else {
        context.matches(CHUNK_SEPARATOR).count() + 1
    }
}

/// Prompt templates.
pub struct Prompts;

impl Prompts {
    /// Prompt for the judge: fixed rubric plus the mandated JSON shape.
    pub fn judge(question: &str, context: &str, answer: &str) -> String {
        format!(
            r#"You are an expert evaluator of retrieval-augmented generation systems in the legal domain.

Grade the answer against the criteria below, each on a scale from 1 to 5.

**QUESTION:**
{question}

**RETRIEVED CONTEXT (UP TO {max} CHUNKS):**
{context}

**GENERATED ANSWER:**
{answer}

**CRITERIA (1-5):**
1. **Factual Consistency:** Is the answer grounded in the context? Are there hallucinations?
2. **Instruction Following:** Does it answer what was asked?
3. **Domain Knowledge:** Does it use correct legal terminology?
4. **Context Precision:** Is the context relevant?
5. **Context Recall:** Does the context hold all the information needed?

**RESPOND IN JSON:**
{{
  "factual_consistency": {{"score": <1-5>, "justification": "..."}},
  "instruction_following": {{"score": <1-5>, "justification": "..."}},
  "domain_knowledge": {{"score": <1-5>, "justification": "..."}},
  "context_precision": {{"score": <1-5>, "justification": "..."}},
  "context_recall": {{"score": <1-5>, "justification": "..."}},
  "overall_assessment": "overall summary in 1-2 sentences"
}}"#,
            max = MAX_JUDGE_CHUNKS,
        )
    }

    /// Prompt for the manual pipeline's answer generation.
    pub fn rag_answer(question: &str, chunks: &[String]) -> String {
        let context = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i + 1, c.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"Answer the question using only the context below. If the context does not contain the answer, say so.

Context:
{context}

Question: {question}

Answer:"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_keeps_order_and_caps_chunks() {
        let chunks: Vec<String> = (1..=7).map(|i| format!("chunk {}", i)).collect();
        let joined = join_chunks(&chunks);

        assert_eq!(count_chunks(&joined), MAX_JUDGE_CHUNKS);
        assert!(joined.starts_with("chunk 1\n\n--- CHUNK SEPARATOR ---\n\nchunk 2"));
        assert!(joined.ends_with("chunk 5"));
        assert!(!joined.contains("chunk 6"));
    }

    #[test]
    fn test_count_chunks_edge_cases() {
        assert_eq!(count_chunks(""), 0);
        assert_eq!(count_chunks("only one"), 1);
        assert_eq!(count_chunks(&join_chunks(&["a", "b"])), 2);
    }

    #[test]
    fn test_judge_prompt_is_deterministic_and_complete() {
        let a = Prompts::judge("Q?", "ctx", "ans");
        let b = Prompts::judge("Q?", "ctx", "ans");
        assert_eq!(a, b);

        for key in [
            "\"factual_consistency\"",
            "\"instruction_following\"",
            "\"domain_knowledge\"",
            "\"context_precision\"",
            "\"context_recall\"",
            "\"overall_assessment\"",
        ] {
            assert!(a.contains(key), "missing {key}");
        }
        assert!(a.contains("Q?") && a.contains("ctx") && a.contains("ans"));
    }

    #[test]
    fn test_rag_answer_prompt_numbers_chunks() {
        let prompt = Prompts::rag_answer("Who?", &["first".to_string(), "second".to_string()]);
        assert!(prompt.contains("[1] first"));
        assert!(prompt.contains("[2] second"));
        assert!(prompt.contains("Question: Who?"));
    }
}
