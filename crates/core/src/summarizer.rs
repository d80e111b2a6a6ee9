use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{PipelineError, Result},
    generation::TextGenerator,
    retry::{RetryPolicy, with_retry},
    types::{ContentSummary, Difficulty, KeyPoint, ONE_LINER_MAX_CHARS, Quote},
};

static SUMMARY_PROMPT: &str = r#"당신은 비즈니스 콘텐츠를 분석해 구조화하는 에디터입니다.

분석 항목:
1. 한 줄 요약 (30자 이내)
2. 핵심 주제 태그 3-5개
3. 난이도: beginner, intermediate, advanced 중 하나
4. 핵심 키워드
5. 핵심 포인트 3-5개 (제목, 설명, 예시)
6. 임팩트 있는 인용구 2-3개 (원문과 한국어 번역)
7. 바로 실행할 수 있는 액션 아이템 1-3개
8. 연관 주제

반드시 아래 JSON 구조로만 응답하세요. JSON 외의 텍스트는 출력하지 않습니다.
모든 필드는 필수이며, 해당 내용이 없으면 빈 배열을 넣습니다.
{
  "one_liner": "한 줄 요약",
  "tags": ["태그1", "태그2", "태그3"],
  "difficulty": "beginner|intermediate|advanced",
  "keywords": ["키워드1", "키워드2"],
  "key_points": [
    {"title": "핵심 포인트 제목", "description": "설명", "example": "예시"}
  ],
  "quotes": [
    {"original": "원문", "translated": "한국어 번역"}
  ],
  "action_items": ["액션1", "액션2"],
  "related_topics": ["관련 주제1", "관련 주제2"]
}"#;

pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryPolicy, max_tokens: u32) -> Self {
        Self {
            generator,
            retry,
            max_tokens,
        }
    }

    /// Structure translated text into a [`ContentSummary`], re-prompting once
    /// with the validation problems if the first answer is malformed.
    pub async fn summarize(&self, korean_text: &str) -> Result<ContentSummary> {
        if korean_text.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "cannot summarize empty text".into(),
            ));
        }

        let prompt = format!(
            "다음 콘텐츠를 분석하고 JSON으로 구조화해 주세요:\n\n{}",
            korean_text
        );
        let raw = self.complete(&prompt).await?;

        let (problems, raw) = match parse_summary(&raw) {
            Ok(summary) => return Ok(self.accepted(summary)),
            Err(PipelineError::SchemaValidation { problems, raw }) => (problems, raw),
            Err(other) => return Err(other),
        };

        warn!(?problems, "summary failed validation, re-prompting once");
        let corrective = corrective_prompt(korean_text, &raw, &problems);
        let retried = self.complete(&corrective).await?;
        parse_summary(&retried).map(|summary| self.accepted(summary))
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        with_retry(&self.retry, "summarize", || {
            self.generator
                .generate(SUMMARY_PROMPT, prompt, self.max_tokens)
        })
        .await
    }

    fn accepted(&self, summary: ContentSummary) -> ContentSummary {
        info!(
            key_points = summary.key_points.len(),
            quotes = summary.quotes.len(),
            difficulty = %summary.difficulty,
            "summary structured"
        );
        summary
    }
}

fn corrective_prompt(korean_text: &str, previous: &str, problems: &[String]) -> String {
    let listed = problems
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "이전 응답이 요구한 JSON 형식과 맞지 않습니다.\n\n문제점:\n{listed}\n\n이전 응답:\n{previous}\n\n\
         문제를 모두 고쳐서 지정된 JSON 구조로만 다시 응답해 주세요. 원본 콘텐츠:\n\n{korean_text}"
    )
}

#[derive(Deserialize)]
struct SummaryDraft {
    one_liner: Option<String>,
    tags: Option<Vec<String>>,
    difficulty: Option<String>,
    keywords: Option<Vec<String>>,
    key_points: Option<Vec<KeyPoint>>,
    quotes: Option<Vec<Quote>>,
    action_items: Option<Vec<String>>,
    related_topics: Option<Vec<String>>,
}

/// Models like to wrap JSON in ```json fences even when told not to.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Validate a model answer against the summary schema.
///
/// Every field must be present. `difficulty` is coerced from known labels,
/// an overlong `one_liner` is truncated and tags are de-duplicated; anything
/// else that does not fit is reported as a schema problem.
pub fn parse_summary(raw: &str) -> Result<ContentSummary> {
    let invalid = |problems: Vec<String>| PipelineError::SchemaValidation {
        problems,
        raw: raw.to_string(),
    };

    let value: Value = serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| invalid(vec![format!("response is not valid JSON: {e}")]))?;
    if !value.is_object() {
        return Err(invalid(vec!["response is not a JSON object".into()]));
    }
    let draft: SummaryDraft =
        serde_json::from_value(value).map_err(|e| invalid(vec![format!("wrong field type: {e}")]))?;

    let mut problems = Vec::new();
    let mut require = |name: &str, present: bool| {
        if !present {
            problems.push(format!("missing field `{name}`"));
        }
    };
    require("one_liner", draft.one_liner.is_some());
    require("tags", draft.tags.is_some());
    require("difficulty", draft.difficulty.is_some());
    require("keywords", draft.keywords.is_some());
    require("key_points", draft.key_points.is_some());
    require("quotes", draft.quotes.is_some());
    require("action_items", draft.action_items.is_some());
    require("related_topics", draft.related_topics.is_some());

    let difficulty = draft.difficulty.as_deref().and_then(|label| {
        let parsed = Difficulty::parse_label(label);
        if parsed.is_none() {
            problems.push(format!(
                "`difficulty` must be beginner, intermediate or advanced, got {label:?}"
            ));
        }
        parsed
    });

    let one_liner = draft.one_liner.as_deref().map(str::trim).unwrap_or_default();
    if draft.one_liner.is_some() && one_liner.is_empty() {
        problems.push("`one_liner` is empty".into());
    }

    if !problems.is_empty() {
        return Err(invalid(problems));
    }

    let (Some(difficulty), Some(tags), Some(keywords), Some(key_points), Some(quotes)) = (
        difficulty,
        draft.tags,
        draft.keywords,
        draft.key_points,
        draft.quotes,
    ) else {
        return Err(invalid(vec!["incomplete summary".into()]));
    };

    Ok(ContentSummary {
        one_liner: one_liner.chars().take(ONE_LINER_MAX_CHARS).collect(),
        tags: dedupe(tags),
        difficulty,
        keywords: clean(keywords),
        key_points,
        quotes,
        action_items: clean(draft.action_items.unwrap_or_default()),
        related_topics: clean(draft.related_topics.unwrap_or_default()),
    })
}

fn clean(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    clean(items)
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
