//! Display text for search hits and the prompt bullet list

use crate::domain::{SearchHit, VectorPayload};

const NO_PAYLOAD_TEXT: &str = "No payload text available";
const NO_MEMORIES_LINE: &str = "- No relevant memories found";

type TextField = fn(&VectorPayload) -> Option<&str>;

fn fact(p: &VectorPayload) -> Option<&str> {
    p.fact.as_deref()
}

fn data(p: &VectorPayload) -> Option<&str> {
    p.data.as_deref()
}

fn text(p: &VectorPayload) -> Option<&str> {
    p.text.as_deref()
}

fn content(p: &VectorPayload) -> Option<&str> {
    p.content.as_deref()
}

fn summary(p: &VectorPayload) -> Option<&str> {
    p.summary.as_deref()
}

/// Tried in order; the first non-blank one is the snippet
const TEXT_FIELDS: [TextField; 5] = [fact, data, text, content, summary];

/// Human-readable text of a payload, never empty
pub fn payload_text(payload: &VectorPayload) -> String {
    if let Some(found) = TEXT_FIELDS
        .iter()
        .find_map(|field| field(payload).filter(|s| !s.trim().is_empty()))
    {
        return found.to_string();
    }

    match serde_json::to_string(&payload.to_json()) {
        Ok(rendered) if rendered != "{}" => rendered,
        _ => NO_PAYLOAD_TEXT.to_string(),
    }
}

/// `- [n] (score: 0.000) text`, one line per hit
pub fn format_bullets(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_MEMORIES_LINE.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let score = hit.rerank_score.unwrap_or(hit.score);
            let score = if score.is_finite() {
                format!("{score:.3}")
            } else {
                "n/a".to_string()
            };
            format!("- [{}] (score: {}) {}", i + 1, score, hit.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(text: &str, score: f32, rerank_score: Option<f32>) -> SearchHit {
        SearchHit {
            id: "memory_1_fact_0".to_string(),
            score,
            text: text.to_string(),
            payload: VectorPayload::default(),
            rerank_score,
        }
    }

    #[test]
    fn test_field_order() {
        let payload = VectorPayload {
            fact: Some("the fact".into()),
            data: Some("the data".into()),
            summary: Some("the summary".into()),
            ..Default::default()
        };
        assert_eq!(payload_text(&payload), "the fact");

        let payload = VectorPayload {
            fact: Some("   ".into()),
            content: Some("the content".into()),
            summary: Some("the summary".into()),
            ..Default::default()
        };
        assert_eq!(payload_text(&payload), "the content");
    }

    #[test]
    fn test_json_fallback() {
        let payload = VectorPayload {
            owner_id: Some(1),
            ..Default::default()
        };
        assert_eq!(payload_text(&payload), r#"{"ownerId":1}"#);
        assert_eq!(payload_text(&VectorPayload::default()), NO_PAYLOAD_TEXT);
    }

    #[test]
    fn test_bullets() {
        let hits = vec![
            hit("Pay $50 to Acme Corp", 0.81234, None),
            hit("Invoice from Acme", 0.7, Some(0.95)),
            hit("Broken score", f32::NAN, None),
        ];
        assert_eq!(
            format_bullets(&hits),
            "- [1] (score: 0.812) Pay $50 to Acme Corp\n\
             - [2] (score: 0.950) Invoice from Acme\n\
             - [3] (score: n/a) Broken score"
        );
        assert_eq!(format_bullets(&[]), NO_MEMORIES_LINE);
    }
}
