use std::sync::Arc;

use tracing::info;

use crate::{
    error::{PipelineError, Result},
    generation::TextGenerator,
    retry::{RetryPolicy, with_retry},
};

static TRANSLATION_PROMPT: &str = r#"당신은 비즈니스·자기계발 영상 스크립트를 한국어로 옮기는 전문 번역가입니다.

번역 원칙:
1. 직역보다 의미 전달을 우선합니다. 한국 독자가 자연스럽게 읽을 수 있어야 합니다.
2. 비즈니스 용어는 한국에서 실제로 쓰는 표현으로 바꿉니다. (leverage → 활용하다, scale → 규모를 키우다)
3. 영상 특유의 대화체와 말투를 살립니다.
4. 사람 이름, 회사명, 브랜드 같은 고유명사는 원문 그대로 둡니다.

출력 규칙:
- 타임스탬프 없이 이어지는 글로 번역합니다.
- 주제가 바뀔 때만 문단을 나눕니다.
- 번역문 외의 설명은 붙이지 않습니다."#;

pub struct Translator {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    max_tokens: u32,
}

impl Translator {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryPolicy, max_tokens: u32) -> Self {
        Self {
            generator,
            retry,
            max_tokens,
        }
    }

    /// Translate a raw transcript into Korean.
    pub async fn translate(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "cannot translate an empty transcript".into(),
            ));
        }

        let prompt = format!("다음 영상 스크립트를 한국어로 번역해 주세요:\n\n{}", text);
        let translated = with_retry(&self.retry, "translate", || {
            self.generator
                .generate(TRANSLATION_PROMPT, &prompt, self.max_tokens)
        })
        .await?;

        let translated = translated.trim().to_string();
        if translated.is_empty() {
            return Err(PipelineError::upstream(
                "text generation",
                "translation came back empty",
            ));
        }

        info!(chars = translated.chars().count(), "transcript translated");
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    struct Scripted {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _system: &str, prompt: &str, _max_tokens: u32) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(PipelineError::upstream("test", "script exhausted")))
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn translates_and_trims() {
        let generator = Scripted::new(vec![Ok("  안녕하세요.\n".into())]);
        let translator = Translator::new(generator.clone(), fast_retry(), 100);

        let korean = translator.translate("Hello.").await.unwrap();

        assert_eq!(korean, "안녕하세요.");
        assert!(generator.prompts.lock().unwrap()[0].ends_with("Hello."));
    }

    #[tokio::test]
    async fn empty_input_makes_no_call() {
        let generator = Scripted::new(vec![]);
        let translator = Translator::new(generator.clone(), fast_retry(), 100);

        let err = translator.translate("   ").await.unwrap_err();

        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(generator.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_upstream_errors_then_succeeds() {
        let generator = Scripted::new(vec![
            Err(PipelineError::upstream("test", "503")),
            Ok("번역".into()),
        ]);
        let translator = Translator::new(generator.clone(), fast_retry(), 100);

        assert_eq!(translator.translate("text").await.unwrap(), "번역");
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_completion_is_upstream_error() {
        let generator = Scripted::new(vec![Ok("   ".into())]);
        let translator = Translator::new(generator, RetryPolicy::no_retry(), 100);

        assert!(matches!(
            translator.translate("text").await,
            Err(PipelineError::Upstream { .. })
        ));
    }
}
