//! Brand-safety assessment: the prompt we send and the answer shape we accept.
//!
//! The assessment itself is produced by an external search + LLM collaborator; this
//! module only builds its inputs and parses (strictly) what comes back.

use crate::{Error, Result, SearchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const ASSESSMENT_SYSTEM_PROMPT: &str = "You evaluate creators for brand risks.";

/// The five HEART brand traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeartTrait {
    Humble,
    Empathetic,
    Adaptable,
    Remarkable,
    Transparent,
}

impl HeartTrait {
    pub const ALL: [HeartTrait; 5] = [
        HeartTrait::Humble,
        HeartTrait::Empathetic,
        HeartTrait::Adaptable,
        HeartTrait::Remarkable,
        HeartTrait::Transparent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HeartTrait::Humble => "Humble",
            HeartTrait::Empathetic => "Empathetic",
            HeartTrait::Adaptable => "Adaptable",
            HeartTrait::Remarkable => "Remarkable",
            HeartTrait::Transparent => "Transparent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Yes,
    No,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Yes => "Yes",
            Verdict::No => "No",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartValue {
    pub value: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Elevated,
    High,
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=3 => RiskBand::Low,
            4..=6 => RiskBand::Elevated,
            _ => RiskBand::High,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 1 (safe) ..= 10 (risky).
    pub risk_score: u8,
    pub flags: Vec<String>,
    pub heart_values: BTreeMap<HeartTrait, HeartValue>,
    pub summary: String,
}

impl RiskAssessment {
    pub fn band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }
}

pub fn brand_safety_query(channel_title: &str) -> String {
    format!(
        "{} YouTube creator news OR controversy OR reviews",
        channel_title.trim()
    )
}

/// One `- title / snippet / link` block per search hit.
pub fn search_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "- {}\n{}\n{}",
                r.title.as_deref().unwrap_or(""),
                r.snippet.as_deref().unwrap_or(""),
                r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn assessment_prompt(context: &str) -> String {
    format!(
        r#"You're a brand safety analyst. Based on these findings, rate the YouTube creator using this JSON format:
{{
  "brand_risk_score": 1-10,
  "risk_flags": ["list if any"],
  "heart_values": {{
    "Humble": "Yes/No",
    "Empathetic": "Yes/No",
    "Adaptable": "Yes/No",
    "Remarkable": "Yes/No",
    "Transparent": "Yes/No"
  }},
  "summary": "short narrative summary"
}}
Answer with the JSON object only.

Findings:
{context}
"#
    )
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Assessment(msg.into())
}

/// Pull the JSON object out of a chat answer: bare, fenced, or wrapped in prose.
fn json_body(text: &str) -> &str {
    let t = text.trim();
    let t = match t.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            rest.trim_end().trim_end_matches("```").trim()
        }
        None => t,
    };
    if t.starts_with('{') {
        return t;
    }
    match (t.find('{'), t.rfind('}')) {
        (Some(a), Some(b)) if a < b => &t[a..=b],
        _ => t,
    }
}

fn score_from(v: &serde_json::Value) -> Result<u8> {
    let n = match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid(format!("brand_risk_score is not a number: {v}")))?;
    if n.fract() != 0.0 || !(1.0..=10.0).contains(&n) {
        return Err(invalid(format!("brand_risk_score out of range 1..=10: {n}")));
    }
    Ok(n as u8)
}

fn flags_from(v: Option<&serde_json::Value>) -> Result<Vec<String>> {
    let keep = |s: &str| {
        let t = s.trim();
        !t.is_empty() && !t.eq_ignore_ascii_case("none") && !t.eq_ignore_ascii_case("n/a")
    };
    match v {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::String(s)) => Ok(if keep(s) {
            vec![s.trim().to_string()]
        } else {
            Vec::new()
        }),
        Some(serde_json::Value::Array(items)) => Ok(items
            .iter()
            .map(|x| match x {
                serde_json::Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| keep(s))
            .collect()),
        Some(other) => Err(invalid(format!("risk_flags has unexpected shape: {other}"))),
    }
}

/// `"Yes"`, `"No - reason"`, `true`, or `{"value": "Yes", "reason": "..."}`.
fn heart_value_from(v: &serde_json::Value) -> Option<HeartValue> {
    match v {
        serde_json::Value::Bool(b) => Some(HeartValue {
            value: if *b { Verdict::Yes } else { Verdict::No },
            reason: None,
        }),
        serde_json::Value::String(s) => {
            let s = s.trim();
            let word_end = s
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(s.len());
            let value = match s[..word_end].to_ascii_lowercase().as_str() {
                "yes" => Verdict::Yes,
                "no" => Verdict::No,
                _ => return None,
            };
            // "Yes/No" echoed from the template is not an answer.
            if s[word_end..].trim_start().starts_with('/') {
                return None;
            }
            let reason = s[word_end..]
                .trim_start_matches(|c: char| {
                    c.is_whitespace() || matches!(c, '-' | ':' | ',' | '.' | '(' | '–' | '—')
                })
                .trim_end_matches(')')
                .trim();
            Some(HeartValue {
                value,
                reason: (!reason.is_empty()).then(|| reason.to_string()),
            })
        }
        serde_json::Value::Object(o) => {
            let inner = ["value", "verdict", "answer"]
                .iter()
                .find_map(|k| o.get(*k))?;
            let mut hv = heart_value_from(inner)?;
            let reason = ["reason", "explanation", "why"]
                .iter()
                .find_map(|k| o.get(*k))
                .and_then(|r| r.as_str())
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty());
            if reason.is_some() {
                hv.reason = reason;
            }
            Some(hv)
        }
        _ => None,
    }
}

/// Parse an assessor answer into a [`RiskAssessment`].
///
/// Fails with [`Error::Assessment`] on empty text, non-JSON, a score outside
/// `1..=10`, a missing or unreadable HEART trait, or a missing summary.
pub fn parse_assessment(text: &str) -> Result<RiskAssessment> {
    let body = json_body(text);
    if body.is_empty() {
        return Err(invalid("empty response"));
    }
    let v: serde_json::Value =
        serde_json::from_str(body).map_err(|e| invalid(format!("response is not JSON: {e}")))?;
    let obj = v
        .as_object()
        .ok_or_else(|| invalid("response is not a JSON object"))?;

    let score = obj
        .get("brand_risk_score")
        .or_else(|| obj.get("risk_score"))
        .ok_or_else(|| invalid("missing brand_risk_score"))?;
    let risk_score = score_from(score)?;
    let flags = flags_from(obj.get("risk_flags").or_else(|| obj.get("flags")))?;

    let hv = obj
        .get("heart_values")
        .and_then(|x| x.as_object())
        .ok_or_else(|| invalid("missing heart_values object"))?;
    let mut heart_values = BTreeMap::new();
    for t in HeartTrait::ALL {
        let raw = hv
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(t.name()))
            .map(|(_, v)| v)
            .ok_or_else(|| invalid(format!("missing HEART trait {}", t.name())))?;
        let value = heart_value_from(raw)
            .ok_or_else(|| invalid(format!("HEART trait {} is not Yes/No: {raw}", t.name())))?;
        heart_values.insert(t, value);
    }

    let summary = obj
        .get("summary")
        .and_then(|x| x.as_str())
        .ok_or_else(|| invalid("missing summary"))?
        .trim()
        .to_string();

    Ok(RiskAssessment {
        risk_score,
        flags,
        heart_values,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
      "brand_risk_score": 3,
      "risk_flags": ["old controversy", "None"],
      "heart_values": {
        "Humble": "Yes",
        "Empathetic": "No - dismissive replies",
        "Adaptable": {"value": "Yes", "reason": "pivots formats"},
        "Remarkable": true,
        "transparent": "Yes (discloses sponsors)"
      },
      "summary": "Mostly safe."
    }"#;

    #[test]
    fn parses_the_documented_shape_and_its_variants() {
        let a = parse_assessment(GOOD).unwrap();
        assert_eq!(a.risk_score, 3);
        assert_eq!(a.band(), RiskBand::Low);
        assert_eq!(a.flags, vec!["old controversy"]);
        assert_eq!(a.heart_values.len(), 5);
        let emp = &a.heart_values[&HeartTrait::Empathetic];
        assert_eq!(emp.value, Verdict::No);
        assert_eq!(emp.reason.as_deref(), Some("dismissive replies"));
        let ada = &a.heart_values[&HeartTrait::Adaptable];
        assert_eq!(ada.reason.as_deref(), Some("pivots formats"));
        assert_eq!(a.heart_values[&HeartTrait::Remarkable].value, Verdict::Yes);
        assert_eq!(
            a.heart_values[&HeartTrait::Transparent].reason.as_deref(),
            Some("discloses sponsors")
        );
        assert_eq!(a.summary, "Mostly safe.");
    }

    #[test]
    fn accepts_fenced_and_prose_wrapped_json() {
        let fenced = format!("```json\n{GOOD}\n```");
        assert_eq!(parse_assessment(&fenced).unwrap().risk_score, 3);
        let prose = format!("Here you go:\n{GOOD}\nThanks!");
        assert_eq!(parse_assessment(&prose).unwrap().risk_score, 3);
    }

    #[test]
    fn rejects_empty_and_malformed_answers() {
        for bad in ["", "   ", "not json", "[1,2]", "```json\n```"] {
            let e = parse_assessment(bad).unwrap_err();
            assert_eq!(e.kind(), "assessment_error", "input {bad:?}");
        }
    }

    #[test]
    fn rejects_out_of_range_scores_and_missing_traits() {
        let v: serde_json::Value = serde_json::from_str(GOOD).unwrap();
        for score in [serde_json::json!(0), serde_json::json!(11), serde_json::json!(4.5)] {
            let mut bad = v.clone();
            bad["brand_risk_score"] = score;
            assert!(parse_assessment(&bad.to_string()).is_err());
        }
        let mut bad = v.clone();
        bad["heart_values"].as_object_mut().unwrap().remove("Humble");
        let e = parse_assessment(&bad.to_string()).unwrap_err();
        assert!(e.to_string().contains("Humble"));

        let mut bad = v.clone();
        bad["heart_values"]["Humble"] = serde_json::json!("Maybe");
        assert!(parse_assessment(&bad.to_string()).is_err());

        let mut bad = v;
        bad.as_object_mut().unwrap().remove("summary");
        assert!(parse_assessment(&bad.to_string()).is_err());
    }

    #[test]
    fn string_scores_and_alias_keys_are_accepted() {
        let js = r#"{"risk_score":"7","flags":"lawsuit","heart_values":{"Humble":"No","Empathetic":"No","Adaptable":"No","Remarkable":"Yes","Transparent":"No"},"summary":""}"#;
        let a = parse_assessment(js).unwrap();
        assert_eq!(a.risk_score, 7);
        assert_eq!(a.band(), RiskBand::High);
        assert_eq!(a.flags, vec!["lawsuit"]);
    }

    #[test]
    fn not_sure_is_not_read_as_no() {
        assert!(heart_value_from(&serde_json::json!("Not sure")).is_none());
        assert_eq!(
            heart_value_from(&serde_json::json!("no")).unwrap().value,
            Verdict::No
        );
    }

    #[test]
    fn template_echo_yes_slash_no_is_rejected() {
        for echo in ["Yes/No", "yes / no", "No/Yes - reason"] {
            assert!(heart_value_from(&serde_json::json!(echo)).is_none(), "{echo}");
        }
        let v: serde_json::Value = serde_json::from_str(GOOD).unwrap();
        let mut bad = v;
        bad["heart_values"]["Humble"] = serde_json::json!("Yes/No");
        let e = parse_assessment(&bad.to_string()).unwrap_err();
        assert!(e.to_string().contains("Humble"), "{e}");
    }

    #[test]
    fn query_and_context_follow_the_search_format() {
        assert_eq!(
            brand_safety_query(" Acme Tech "),
            "Acme Tech YouTube creator news OR controversy OR reviews"
        );
        let ctx = search_context(&[SearchResult {
            url: "https://example.com/a".to_string(),
            title: Some("Acme review".to_string()),
            snippet: None,
            source: "serpapi".to_string(),
        }]);
        assert_eq!(ctx, "- Acme review\n\nhttps://example.com/a");
        assert!(assessment_prompt(&ctx).contains("https://example.com/a"));
        assert_eq!(RiskBand::from_score(6), RiskBand::Elevated);
    }
}
