use super::provider::{ModelHandle, ModelProvider};
use crate::error::{Result, StudyError};
use tracing::warn;

/// Send `prompt` through `handle`, retrying once with a freshly built model.
///
/// The retry re-uses the schema the failed handle was bound to. At most two
/// sends happen per call; when no fresh handle can be built the first
/// failure is reported.
pub async fn invoke_with_retry(
    provider: &mut ModelProvider,
    handle: &ModelHandle,
    prompt: &str,
) -> Result<String> {
    invoke_validated(provider, handle, prompt, Ok).await
}

/// Like `invoke_with_retry`, but a reply rejected by `validate` counts as a
/// failed send and triggers the retry too.
pub async fn invoke_validated<T, F>(
    provider: &mut ModelProvider,
    handle: &ModelHandle,
    prompt: &str,
    validate: F,
) -> Result<T>
where
    F: Fn(String) -> Result<T>,
{
    let first = match handle.invoke(prompt).await.and_then(&validate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    warn!(error = %first, "model call failed, retrying once after re-initializing");

    let Some(fresh) = provider.get_model(handle.schema().cloned(), true) else {
        return Err(StudyError::Invocation {
            attempts: 1,
            source: Box::new(first),
        });
    };

    fresh
        .invoke(prompt)
        .await
        .and_then(&validate)
        .map_err(|e| StudyError::Invocation {
            attempts: 2,
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::FakeModel;
    use crate::gemini::{parse_structured, OutputSchema, SyllabusTopics};

    #[tokio::test]
    async fn test_success_sends_once() {
        let fake = FakeModel::new().reply("hello");
        let mut provider = fake.provider();
        let handle = provider.get_model(None, false).unwrap();

        let reply = invoke_with_retry(&mut provider, &handle, "hi").await.unwrap();
        assert_eq!(reply, "hello");
        assert_eq!(fake.sends(), 1);
        assert_eq!(fake.connects(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_failure_rebuilds_provider() {
        let fake = FakeModel::new().fail("connection reset").reply("second time lucky");
        let mut provider = fake.provider();
        let handle = provider.get_model(None, false).unwrap();

        let reply = invoke_with_retry(&mut provider, &handle, "hi").await.unwrap();
        assert_eq!(reply, "second time lucky");
        assert_eq!(fake.sends(), 2);
        assert_eq!(fake.connects(), 2);
        assert_eq!(fake.prompts(), vec!["hi".to_string(), "hi".to_string()]);
    }

    #[tokio::test]
    async fn test_never_sends_more_than_twice() {
        let fake = FakeModel::new().fail("one").fail("two").fail("three");
        let mut provider = fake.provider();
        let handle = provider.get_model(None, false).unwrap();

        let err = invoke_with_retry(&mut provider, &handle, "hi").await.unwrap_err();
        assert_eq!(fake.sends(), 2);
        match err {
            StudyError::Invocation { attempts, source } => {
                assert_eq!(attempts, 2);
                assert_eq!(source.to_string(), "Model error: two");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unobtainable_reinit_surfaces_original_failure() {
        let fake = FakeModel::new().fail("original failure").refuse_connects_after(1);
        let mut provider = fake.provider();
        let handle = provider.get_model(None, false).unwrap();

        let err = invoke_with_retry(&mut provider, &handle, "hi").await.unwrap_err();
        assert_eq!(fake.sends(), 1);
        match err {
            StudyError::Invocation { attempts, source } => {
                assert_eq!(attempts, 1);
                assert!(matches!(*source, StudyError::Model(ref m) if m == "original failure"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_reply_is_retried() {
        let fake = FakeModel::new().reply("sorry, no json").reply("{\"topics\": []}");
        let mut provider = fake.provider();
        let handle = provider
            .get_model(Some(OutputSchema::of::<SyllabusTopics>()), false)
            .unwrap();

        let topics = invoke_validated(&mut provider, &handle, "topics please", |raw| {
            parse_structured::<SyllabusTopics>(&raw)
        })
        .await
        .unwrap();
        assert!(topics.topics.is_empty());
        assert_eq!(fake.sends(), 2);
        assert_eq!(fake.connects(), 2);
    }

    #[tokio::test]
    async fn test_second_rejected_reply_reports_validation_error() {
        let fake = FakeModel::new().reply("nope").reply("still nope").reply("{\"topics\": []}");
        let mut provider = fake.provider();
        let handle = provider.get_model(None, false).unwrap();

        let err = invoke_validated(&mut provider, &handle, "topics please", |raw| {
            parse_structured::<SyllabusTopics>(&raw)
        })
        .await
        .unwrap_err();
        assert_eq!(fake.sends(), 2);
        match err {
            StudyError::Invocation { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, StudyError::SchemaMismatch(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_retry_keeps_schema() {
        let fake = FakeModel::new().fail("malformed").reply("{\"topics\": []}");
        let mut provider = fake.provider();
        let handle = provider
            .get_model(Some(OutputSchema::of::<SyllabusTopics>()), false)
            .unwrap();

        invoke_with_retry(&mut provider, &handle, "topics please").await.unwrap();
        assert_eq!(
            fake.schemas(),
            vec![Some("SyllabusTopics".to_string()), Some("SyllabusTopics".to_string())]
        );
    }
}
