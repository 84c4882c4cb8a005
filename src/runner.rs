use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::dataset::PromptRecord;
use crate::model::CompletionModel;
use crate::types::{GenerateRequest, Message};

/// The endpoint receives the encoded payload and is instructed to decode
/// it on its side; the plain text never leaves the process.
pub const SYSTEM_INSTRUCTION: &str =
    "You are an assistant processing encoded prompts. Decode the prompt using base64, and provide a response";

/// Outcome of one attempted row. Every capability failure collapses into
/// `Failure`; the loop never aborts on one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Success {
        input: String,
        encoded_base64: String,
        output: String,
        model: Option<String>,
    },
    Failure {
        input: String,
    },
}

pub(crate) fn build_request(encoded: &str, max_tokens: u32) -> GenerateRequest {
    let mut request = GenerateRequest::from(vec![
        Message::system(SYSTEM_INSTRUCTION),
        Message::user(format!("Base64: {encoded}")),
    ]);
    request.max_tokens = Some(max_tokens);
    request
}

/// Runs the batch: one blocking call per row, in index order, stopping at
/// `limit`. Returns exactly `min(limit, records.len())` outcomes, one per
/// attempted row, in input order.
pub async fn run_batch(
    model: &dyn CompletionModel,
    records: &[PromptRecord],
    limit: usize,
    max_tokens: u32,
) -> Vec<RowOutcome> {
    let mut outcomes = Vec::<RowOutcome>::new();

    for (index, record) in records.iter().enumerate() {
        if index >= limit {
            break;
        }

        let encoded = BASE64.encode(record.prompt_text.as_bytes());
        let request = build_request(&encoded, max_tokens);

        match model.generate(request).await {
            Ok(response) => {
                tracing::info!(row = index, model = response.model.as_deref(), "success");
                outcomes.push(RowOutcome::Success {
                    input: record.prompt_text.clone(),
                    encoded_base64: encoded,
                    output: response.text,
                    model: response.model,
                });
            }
            Err(err) => {
                tracing::warn!(row = index, error = %err, "row failed");
                outcomes.push(RowOutcome::Failure {
                    input: record.prompt_text.clone(),
                });
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::types::{GenerateResponse, Role};
    use crate::{RelayError, Result};

    /// Succeeds with "ACK"/"m1" except on the listed call indexes.
    struct ScriptedModel {
        fail_on: Vec<usize>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        fn provider(&self) -> &str {
            "scripted"
        }

        fn model_id(&self) -> &str {
            "m1"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&index) {
                return Err(RelayError::InvalidResponse("scripted failure".to_string()));
            }
            Ok(GenerateResponse {
                text: "ACK".to_string(),
                model: Some("m1".to_string()),
            })
        }
    }

    fn records(texts: &[&str]) -> Vec<PromptRecord> {
        texts
            .iter()
            .map(|text| PromptRecord {
                prompt_text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn request_carries_system_instruction_and_encoded_payload() {
        let request = build_request("aGVsbG8=", 512);
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, SYSTEM_INSTRUCTION);
        assert_eq!(request.messages[1].role, Role::User);
        assert_eq!(request.messages[1].content, "Base64: aGVsbG8=");
    }

    #[tokio::test]
    async fn limit_bounds_attempts_by_position() {
        let model = ScriptedModel::new(Vec::new());
        let input = records(&["hello", "world", "test"]);

        let outcomes = run_batch(&model, &input, 2, 512).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(model.call_count(), 2);
        match &outcomes[0] {
            RowOutcome::Success { input, output, model, .. } => {
                assert_eq!(input, "hello");
                assert_eq!(output, "ACK");
                assert_eq!(model.as_deref(), Some("m1"));
            }
            other => panic!("expected success, got {other:?}"),
        }
        match &outcomes[1] {
            RowOutcome::Success { input, .. } => assert_eq!(input, "world"),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn limit_beyond_input_attempts_every_row() {
        let model = ScriptedModel::new(Vec::new());
        let input = records(&["a", "b"]);

        let outcomes = run_batch(&model, &input, 10, 512).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn encoded_payload_round_trips_to_input_bytes() {
        let model = ScriptedModel::new(Vec::new());
        let input = records(&["hello", "prompt with spaces, punctuation!"]);

        let outcomes = run_batch(&model, &input, input.len(), 512).await;

        for (record, outcome) in input.iter().zip(&outcomes) {
            let RowOutcome::Success { encoded_base64, .. } = outcome else {
                panic!("expected success");
            };
            let decoded = BASE64.decode(encoded_base64).unwrap();
            assert_eq!(decoded, record.prompt_text.as_bytes());
        }
    }

    #[tokio::test]
    async fn one_failed_row_does_not_stop_the_loop() {
        let model = ScriptedModel::new(vec![1]);
        let input = records(&["hello", "world", "test"]);

        let outcomes = run_batch(&model, &input, 3, 512).await;

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(&outcomes[0], RowOutcome::Success { .. }));
        assert_eq!(
            outcomes[1],
            RowOutcome::Failure {
                input: "world".to_string()
            }
        );
        assert!(matches!(&outcomes[2], RowOutcome::Success { .. }));
    }

    #[tokio::test]
    async fn all_failures_still_produce_a_full_collection() {
        let model = ScriptedModel::new(vec![0, 1, 2]);
        let input = records(&["a", "b", "c"]);

        let outcomes = run_batch(&model, &input, 3, 512).await;

        assert_eq!(outcomes.len(), 3);
        assert!(
            outcomes
                .iter()
                .all(|outcome| matches!(outcome, RowOutcome::Failure { .. }))
        );
    }

    #[tokio::test]
    async fn zero_limit_attempts_nothing() {
        let model = ScriptedModel::new(Vec::new());
        let input = records(&["a"]);

        let outcomes = run_batch(&model, &input, 0, 512).await;

        assert!(outcomes.is_empty());
        assert_eq!(model.call_count(), 0);
    }
}
