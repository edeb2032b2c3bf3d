//! Prompt construction and response parsing shared by the LLM extractors.

use super::ExtractionResult;
use crate::error::ExtractionError;
use crate::services::types::{
    Category, ImpactScope, QualitativeScores, QualitativeSignal, MAX_QUALITATIVE_SCORE,
};
use crate::vcs::{CommitDiff, CommitInfo};
use serde::Deserialize;

/// Recorded in `analysis_meta.prompt_version`; bump when the prompt changes.
pub const PROMPT_VERSION: &str = "commit-v2";

pub const MAX_DIFF_LINES: usize = 500;

pub const SYSTEM_PROMPT: &str = "\
You are an expert software engineer analyzing git commits to extract semantic understanding.

Your task is to analyze the commit message and code diff to determine:
1. What the change ACTUALLY does (which may differ from the commit message)
2. The category of change (feature, fix, security, performance, refactor, chore)
3. The behavior before and after (for fixes and features)
4. The scope of impact (public_api, internal, dependency, config, docs, test, unknown)
5. Whether this is a breaking change
6. Key technical decisions made in the implementation

Guidelines:
- Be specific and actionable in your descriptions
- For behavior_before/after, focus on observable differences
- Only mark as breaking if external consumers are affected
- Look at actual code changes, not just the commit message
- For refactors and chores, behavior_before and behavior_after should be null
- For new features without prior behavior, behavior_before should be null
- Technical highlights should focus on HOW, not WHAT

Respond with a single JSON object with these keys:
intent_summary (string), category (string), behavior_before (string or null),
behavior_after (string or null), impact_scope (string), is_breaking (boolean),
risk_explanation (string or null), technical_highlights (array of strings),
confidence_score (number between 0 and 1),
qualitative (object with optional keys technical_difficulty, creativity, mental_load,
review_effort, ambiguity; each {\"score\": 0-10, \"explanation\": string}).
";

/// User prompt for a single commit. The patch is cut after `max_diff_lines` lines.
pub fn build_prompt(commit: &CommitInfo, diff: &CommitDiff, max_diff_lines: usize) -> String {
    let lines: Vec<&str> = diff.patch.lines().collect();
    let patch = if lines.len() > max_diff_lines {
        format!(
            "{}\n\n... (diff truncated, {} more lines)",
            lines[..max_diff_lines].join("\n"),
            lines.len() - max_diff_lines
        )
    } else {
        diff.patch.trim_end().to_string()
    };

    let mut parts = vec![
        "Analyze the following git commit and extract semantic information.".to_string(),
        String::new(),
        "## Commit Information".to_string(),
        format!("- **SHA**: {}", commit.short_id),
        format!("- **Author**: {} <{}>", commit.author_name, commit.author_email),
        format!("- **Date**: {}", commit.timestamp.to_rfc3339()),
        String::new(),
        "## Commit Message".to_string(),
        "```".to_string(),
        commit.full_message.clone(),
        "```".to_string(),
        String::new(),
        "## Code Diff".to_string(),
    ];

    if patch.is_empty() {
        parts.push(
            "(No diff available - this may be a merge commit or an empty commit)".to_string(),
        );
    } else {
        parts.push("```diff".to_string());
        parts.push(patch);
        parts.push("```".to_string());
    }

    parts.push(String::new());
    parts.push("## Instructions".to_string());
    parts.push(
        "Based on the commit message and diff above, extract the semantic information.".to_string(),
    );
    parts.push("Focus on understanding the REAL intent and impact of this change.".to_string());

    parts.join("\n")
}

#[derive(Debug, Deserialize)]
struct SignalPayload {
    score: Option<u8>,
    explanation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct QualitativePayload {
    technical_difficulty: Option<SignalPayload>,
    creativity: Option<SignalPayload>,
    mental_load: Option<SignalPayload>,
    review_effort: Option<SignalPayload>,
    ambiguity: Option<SignalPayload>,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    intent_summary: String,
    category: String,
    behavior_before: Option<String>,
    behavior_after: Option<String>,
    impact_scope: String,
    #[serde(default)]
    is_breaking: bool,
    risk_explanation: Option<String>,
    #[serde(default)]
    technical_highlights: Vec<String>,
    confidence_score: Option<f32>,
    qualitative: Option<QualitativePayload>,
}

fn signal(
    extractor: &str,
    name: &str,
    payload: Option<SignalPayload>,
) -> Result<Option<QualitativeSignal>, ExtractionError> {
    let Some(payload) = payload else {
        return Ok(None);
    };
    let Some(score) = payload.score else {
        return Ok(None);
    };
    if score > MAX_QUALITATIVE_SCORE {
        return Err(ExtractionError::Failed {
            extractor: extractor.to_string(),
            message: format!("qualitative score '{}' is {} (max 10)", name, score),
        });
    }
    Ok(Some(QualitativeSignal {
        score,
        explanation: payload.explanation.filter(|e| !e.trim().is_empty()),
    }))
}

/// Strip a surrounding markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a model answer into a partial result.
///
/// Malformed JSON or values outside the closed enumerations are extraction
/// failures so the pipeline can fall back to the next extractor.
pub fn parse_response(extractor: &str, text: &str) -> Result<ExtractionResult, ExtractionError> {
    let failed = |message: String| ExtractionError::Failed {
        extractor: extractor.to_string(),
        message,
    };

    let payload: CommitPayload = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| failed(format!("malformed response: {}", e)))?;

    let category: Category = payload
        .category
        .parse()
        .map_err(|e| failed(format!("{}", e)))?;
    let impact_scope: ImpactScope = payload
        .impact_scope
        .parse()
        .map_err(|e| failed(format!("{}", e)))?;

    if let Some(score) = payload.confidence_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(failed(format!("confidence_score {} is outside [0, 1]", score)));
        }
    }

    let qualitative = match payload.qualitative {
        Some(q) => {
            let scores = QualitativeScores {
                technical_difficulty: signal(
                    extractor,
                    "technical_difficulty",
                    q.technical_difficulty,
                )?,
                creativity: signal(extractor, "creativity", q.creativity)?,
                mental_load: signal(extractor, "mental_load", q.mental_load)?,
                review_effort: signal(extractor, "review_effort", q.review_effort)?,
                ambiguity: signal(extractor, "ambiguity", q.ambiguity)?,
            };
            (!scores.is_empty()).then_some(scores)
        },
        None => None,
    };

    let intent = payload.intent_summary.trim().to_string();

    Ok(ExtractionResult {
        intent_summary: (!intent.is_empty()).then_some(intent),
        category: Some(category),
        behavior_before: payload.behavior_before,
        behavior_after: payload.behavior_after,
        impact_scope: Some(impact_scope),
        is_breaking: Some(payload.is_breaking),
        risk_explanation: payload.risk_explanation,
        technical_highlights: Some(payload.technical_highlights),
        confidence_score: payload.confidence_score,
        qualitative,
        prompt_version: Some(PROMPT_VERSION.to_string()),
        ..Default::default()
    })
}
