use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Maximum ROI batch size the service may return.
pub const MAX_ROI: usize = 5;

/// Required length of each ROI's logic trace.
pub const RATIONALE_POINTS: usize = 2;

/// Labels the persona contract forbids. The service is instructed to name
/// the specific noun; a response that falls back to these is rejected.
const GENERIC_LABELS: &[&str] = &["object", "item", "primary subject", "neutral backdrop"];

/// Focus mode selects the analysis lens. Keyed into a static instruction
/// table embedded in the request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FocusMode {
    General,
    HomeSafety,
    Wellness,
    HobbyHelp,
    Workspace,
}

impl FocusMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FocusMode::General => "GENERAL",
            FocusMode::HomeSafety => "HOME_SAFETY",
            FocusMode::Wellness => "WELLNESS",
            FocusMode::HobbyHelp => "HOBBY_HELP",
            FocusMode::Workspace => "WORKSPACE",
        }
    }

    /// Focus-specific instruction text for the system prompt.
    pub fn instruction(self) -> &'static str {
        match self {
            FocusMode::General => {
                "Analyze the scene holistically. Identify specific objects and their tactical relevance."
            }
            FocusMode::HomeSafety => {
                "Focus on safety: detect tripping hazards, electrical risks, sharp edges, or unsecured items."
            }
            FocusMode::Wellness => {
                "Focus on mental well-being: analyze lighting quality, plant health, and ergonomic comfort."
            }
            FocusMode::HobbyHelp => {
                "Focus on tools and creativity: identify specific hardware or materials and suggest improvements."
            }
            FocusMode::Workspace => {
                "Focus on productivity: analyze desk ergonomics, screen placement, and clutter management."
            }
        }
    }
}

/// Voice selector for the synthesized verbal report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceOption {
    Male,
    Female,
}

impl VoiceOption {
    /// Prebuilt voice name the TTS endpoint understands.
    pub fn voice_name(self) -> &'static str {
        match self {
            VoiceOption::Male => "Puck",
            VoiceOption::Female => "Kore",
        }
    }
}

/// Ordered 3-level severity. The contract went through two spellings
/// (SECURE/ADVISORY/ATTENTION and MINIMAL/CAUTION/HAZARD); both map onto
/// this one canonical scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "SECURE", alias = "MINIMAL")]
    Secure,
    #[serde(rename = "ADVISORY", alias = "CAUTION")]
    Advisory,
    #[serde(rename = "ATTENTION", alias = "HAZARD")]
    Attention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Electronic,
    Organic,
    Structural,
    Tool,
    Unknown,
}

/// One detected point of interest. Created in a batch from one analysis
/// response; `thumbnail` is absent at creation and populated once by the
/// crop generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roi {
    pub label: String,
    /// Normalized position, percent of frame width.
    pub x: f64,
    /// Normalized position, percent of frame height.
    pub y: f64,
    pub category: Category,
    /// Percent, 0-100.
    pub confidence: f64,
    #[serde(alias = "threatLevel")]
    pub safety_rating: Severity,
    pub description: String,
    pub recommendation: String,
    pub why_it_matters: String,
    pub rationale: Vec<String>,
    /// Base64 JPEG crop, set by the crop generator. Immutable once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Validated result of one analysis cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAnalysis {
    /// Short verbal report, spoken aloud when speech is enabled.
    pub verbal: String,
    pub roi: Vec<Roi>,
    #[serde(default)]
    pub summary_rationale: String,
    /// Environmental efficiency, 0-100.
    pub ambient_score: f64,
    /// One word for the atmosphere.
    pub mood_descriptor: String,
}

fn in_percent_range(v: f64) -> bool {
    v.is_finite() && (0.0..=100.0).contains(&v)
}

impl Roi {
    fn validate(&self, idx: usize) -> Result<(), String> {
        if self.label.trim().is_empty() {
            return Err(format!("roi[{idx}]: empty label"));
        }
        let lowered = self.label.trim().to_ascii_lowercase();
        if GENERIC_LABELS.contains(&lowered.as_str()) {
            return Err(format!("roi[{idx}]: generic label {:?}", self.label));
        }
        if !in_percent_range(self.x) || !in_percent_range(self.y) {
            return Err(format!(
                "roi[{idx}]: position ({}, {}) outside [0,100]",
                self.x, self.y
            ));
        }
        if !in_percent_range(self.confidence) {
            return Err(format!(
                "roi[{idx}]: confidence {} outside [0,100]",
                self.confidence
            ));
        }
        if self.rationale.len() != RATIONALE_POINTS {
            return Err(format!(
                "roi[{idx}]: expected {RATIONALE_POINTS} rationale points, got {}",
                self.rationale.len()
            ));
        }
        Ok(())
    }
}

impl SceneAnalysis {
    /// Required-field and range validation per the response contract.
    /// A violation rejects the whole result; nothing is coerced.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbal.trim().is_empty() {
            return Err("empty verbal report".into());
        }
        if self.roi.is_empty() {
            return Err("empty roi batch".into());
        }
        if self.roi.len() > MAX_ROI {
            return Err(format!(
                "{} roi entries exceeds cap of {MAX_ROI}",
                self.roi.len()
            ));
        }
        if !in_percent_range(self.ambient_score) {
            return Err(format!("ambientScore {} outside [0,100]", self.ambient_score));
        }
        if self.mood_descriptor.trim().is_empty() {
            return Err("empty moodDescriptor".into());
        }
        for (idx, roi) in self.roi.iter().enumerate() {
            roi.validate(idx)?;
        }
        Ok(())
    }
}

/// Decode-and-validate step for the raw response text. Any missing required
/// field, out-of-range numeric, or malformed encoding raises
/// [`PipelineError::Schema`].
pub fn decode_analysis(text: &str) -> Result<SceneAnalysis, PipelineError> {
    let analysis: SceneAnalysis = serde_json::from_str(text)
        .map_err(|e| PipelineError::Schema(format!("bad analysis JSON: {e}")))?;
    analysis.validate().map_err(PipelineError::Schema)?;
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_roi_json() -> serde_json::Value {
        serde_json::json!({
            "label": "Ceramic Coffee Mug",
            "x": 42.5,
            "y": 61.0,
            "category": "TOOL",
            "confidence": 88.0,
            "safetyRating": "SECURE",
            "description": "Half-full mug near the keyboard edge.",
            "recommendation": "Move the mug away from the keyboard.",
            "whyItMatters": "Spill risk over electronics.",
            "rationale": ["Cylindrical ceramic profile", "Handle silhouette at 3 o'clock"]
        })
    }

    fn valid_analysis_json() -> serde_json::Value {
        serde_json::json!({
            "verbal": "Three assets locked. Sector nominal.",
            "roi": [valid_roi_json(), valid_roi_json(), valid_roi_json()],
            "summaryRationale": "Desk environment, low threat.",
            "ambientScore": 72.0,
            "moodDescriptor": "Focused"
        })
    }

    #[test]
    fn decodes_valid_payload() {
        let analysis = decode_analysis(&valid_analysis_json().to_string()).unwrap();
        assert_eq!(analysis.roi.len(), 3);
        assert_eq!(analysis.roi[0].safety_rating, Severity::Secure);
        assert_eq!(analysis.roi[0].category, Category::Tool);
        assert!(analysis.roi[0].thumbnail.is_none());
    }

    #[test]
    fn missing_roi_is_schema_error() {
        let mut v = valid_analysis_json();
        v.as_object_mut().unwrap().remove("roi");
        match decode_analysis(&v.to_string()) {
            Err(PipelineError::Schema(_)) => {}
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn empty_roi_batch_is_schema_error() {
        let mut v = valid_analysis_json();
        v["roi"] = serde_json::json!([]);
        assert!(matches!(
            decode_analysis(&v.to_string()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn oversized_roi_batch_is_schema_error() {
        let mut v = valid_analysis_json();
        v["roi"] = serde_json::json!([
            valid_roi_json(), valid_roi_json(), valid_roi_json(),
            valid_roi_json(), valid_roi_json(), valid_roi_json()
        ]);
        assert!(matches!(
            decode_analysis(&v.to_string()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn out_of_range_position_is_schema_error() {
        let mut v = valid_analysis_json();
        v["roi"][1]["x"] = serde_json::json!(120.0);
        assert!(matches!(
            decode_analysis(&v.to_string()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn out_of_range_ambient_score_is_schema_error() {
        let mut v = valid_analysis_json();
        v["ambientScore"] = serde_json::json!(-3.0);
        assert!(matches!(
            decode_analysis(&v.to_string()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn generic_label_is_rejected() {
        let mut v = valid_analysis_json();
        v["roi"][0]["label"] = serde_json::json!("Primary Subject");
        assert!(matches!(
            decode_analysis(&v.to_string()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn wrong_rationale_arity_is_schema_error() {
        let mut v = valid_analysis_json();
        v["roi"][0]["rationale"] = serde_json::json!(["only one point"]);
        assert!(matches!(
            decode_analysis(&v.to_string()),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn malformed_encoding_is_schema_error() {
        assert!(matches!(
            decode_analysis("not json at all {{{"),
            Err(PipelineError::Schema(_))
        ));
    }

    #[test]
    fn legacy_severity_spellings_map_onto_canonical_scale() {
        let mut v = valid_analysis_json();
        v["roi"][0]["safetyRating"] = serde_json::json!("HAZARD");
        v["roi"][1]["safetyRating"] = serde_json::json!("CAUTION");
        v["roi"][2]["safetyRating"] = serde_json::json!("MINIMAL");
        let analysis = decode_analysis(&v.to_string()).unwrap();
        assert_eq!(analysis.roi[0].safety_rating, Severity::Attention);
        assert_eq!(analysis.roi[1].safety_rating, Severity::Advisory);
        assert_eq!(analysis.roi[2].safety_rating, Severity::Secure);
    }

    #[test]
    fn legacy_threat_level_key_is_accepted() {
        let mut v = valid_analysis_json();
        let roi = v["roi"][0].as_object_mut().unwrap();
        let rating = roi.remove("safetyRating").unwrap();
        roi.insert("threatLevel".into(), rating);
        let analysis = decode_analysis(&v.to_string()).unwrap();
        assert_eq!(analysis.roi[0].safety_rating, Severity::Secure);
    }

    #[test]
    fn severity_scale_is_ordered() {
        assert!(Severity::Secure < Severity::Advisory);
        assert!(Severity::Advisory < Severity::Attention);
    }

    #[test]
    fn summary_rationale_is_optional() {
        let mut v = valid_analysis_json();
        v.as_object_mut().unwrap().remove("summaryRationale");
        let analysis = decode_analysis(&v.to_string()).unwrap();
        assert!(analysis.summary_rationale.is_empty());
    }

    #[test]
    fn focus_mode_instruction_table_is_distinct() {
        let modes = [
            FocusMode::General,
            FocusMode::HomeSafety,
            FocusMode::Wellness,
            FocusMode::HobbyHelp,
            FocusMode::Workspace,
        ];
        for (i, a) in modes.iter().enumerate() {
            for b in modes.iter().skip(i + 1) {
                assert_ne!(a.instruction(), b.instruction());
            }
        }
    }

    #[test]
    fn voice_names() {
        assert_eq!(VoiceOption::Male.voice_name(), "Puck");
        assert_eq!(VoiceOption::Female.voice_name(), "Kore");
    }
}
