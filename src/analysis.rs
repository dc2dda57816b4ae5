//! Interface to an external image analysis service
//!
//! The service itself lives elsewhere. This module prepares what it consumes
//! (an 8-bit PNG preview plus a radiologist prompt) and turns its free-text
//! answer into either structured findings or the raw text.

use std::io::Cursor;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GrayImage, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::exam::Exam;
use crate::models::slice::PixelGrid;

/// Previews larger than this on either side are scaled down
pub const MAX_PREVIEW_EXTENT: u32 = 2048;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Pixel grid cannot be previewed: {0}")]
    InvalidGrid(String),

    #[error("Failed to encode preview: {0}")]
    Image(#[from] image::ImageError),

    #[error("Analysis service failed: {0}")]
    Service(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Moderate,
    Low,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Moderate,
    Low,
    None,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// tumor, fracture, calcification, lesion, normal or other
    pub category: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub confidence: Confidence,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Findings {
    pub summary: String,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default = "unknown_confidence")]
    pub ai_confidence: Confidence,
}

fn unknown_confidence() -> Confidence {
    Confidence::Unknown
}

/// Result of interpreting the service's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Structured(Findings),
    /// The answer held no usable findings object; kept verbatim
    Fallback(String),
}

/// Everything the analysis service needs for one image
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub image_png_base64: String,
    pub modality: String,
    pub patient_name: String,
    pub study_description: String,
    pub prompt: String,
}

impl AnalysisRequest {
    pub fn for_slice(exam: &Exam, pixels: &PixelGrid) -> Result<Self, AnalysisError> {
        Ok(Self {
            image_png_base64: preview_png_base64(pixels)?,
            modality: exam.modality.clone(),
            patient_name: exam.subject.name.clone(),
            study_description: exam.description.clone(),
            prompt: analysis_prompt(&exam.modality, &exam.subject.name, &exam.description),
        })
    }
}

/// External analysis service, consumed as an opaque function
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String, AnalysisError>;
}

/// Ask `analyzer` about one slice and interpret the answer
pub async fn analyze_slice(
    analyzer: &dyn ImageAnalyzer,
    exam: &Exam,
    pixels: &PixelGrid,
) -> Result<AnalysisOutcome, AnalysisError> {
    let request = AnalysisRequest::for_slice(exam, pixels)?;
    let raw = analyzer.analyze(&request).await?;
    Ok(parse_findings(&raw))
}

pub fn analysis_prompt(modality: &str, patient_name: &str, study_description: &str) -> String {
    let description = if study_description.trim().is_empty() {
        "Not provided"
    } else {
        study_description
    };
    format!(
        r#"You are an expert radiologist AI assistant analyzing medical images.

**Patient Information:**
- Name: {patient_name}
- Study Type: {modality}
- Description: {description}

**Your Task:**
Analyze this medical image and provide a comprehensive assessment. Focus on identifying:

1. **Abnormalities**: Any tumors, masses, lesions, fractures, calcifications, or unusual findings
2. **Anatomical Assessment**: Evaluation of organs, bones, and soft tissues
3. **Pathological Signs**: Signs of disease, injury, or abnormal conditions
4. **Critical Findings**: Any urgent or critical conditions requiring immediate attention

**Response Format (JSON):**
{{
    "summary": "Brief 2-3 sentence overview of the image and key findings",
    "findings": [
        {{
            "category": "tumor|fracture|calcification|lesion|normal|other",
            "description": "Detailed description of the finding",
            "location": "Specific anatomical location",
            "confidence": "high|moderate|low",
            "severity": "critical|high|moderate|low|none"
        }}
    ],
    "recommendations": [
        "Specific recommendation 1",
        "Specific recommendation 2"
    ],
    "ai_confidence": "Overall confidence in this analysis (high|moderate|low)"
}}

**Important Guidelines:**
- Be precise and use proper medical terminology
- If the image appears normal, state that clearly
- For any abnormality, specify exact location and characteristics
- Provide actionable recommendations
- Note if image quality affects assessment
- Always include confidence levels

Analyze the image now:"#
    )
}

/// Take the outermost `{...}` span of `raw` and read it as [`Findings`]
pub fn parse_findings(raw: &str) -> AnalysisOutcome {
    let span = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => {
            debug!("analysis answer holds no JSON object");
            return AnalysisOutcome::Fallback(raw.to_string());
        }
    };
    match serde_json::from_str::<Findings>(span) {
        Ok(findings) => AnalysisOutcome::Structured(findings),
        Err(e) => {
            warn!("Could not parse analysis findings: {}", e);
            AnalysisOutcome::Fallback(raw.to_string())
        }
    }
}

/// Min/max-normalized 8-bit grayscale PNG, base64 encoded
pub fn preview_png_base64(pixels: &PixelGrid) -> Result<String, AnalysisError> {
    let png = preview_png(pixels)?;
    Ok(STANDARD.encode(png))
}

pub fn preview_png(pixels: &PixelGrid) -> Result<Vec<u8>, AnalysisError> {
    let dims = pixels.dimensions();
    let (min, max) = pixels
        .value_range()
        .ok_or_else(|| AnalysisError::InvalidGrid("empty grid".to_string()))?;
    let span = (max as i32 - min as i32) as f64;
    let gray: Vec<u8> = pixels
        .values()
        .iter()
        .map(|&v| {
            if span == 0.0 {
                0
            } else {
                ((v as i32 - min as i32) as f64 / span * 255.0).round() as u8
            }
        })
        .collect();

    let buffer = GrayImage::from_raw(dims.width, dims.height, gray).ok_or_else(|| {
        AnalysisError::InvalidGrid(format!(
            "{} does not match {} samples",
            dims,
            pixels.values().len()
        ))
    })?;
    let mut image = DynamicImage::ImageLuma8(buffer);
    if dims.width > MAX_PREVIEW_EXTENT || dims.height > MAX_PREVIEW_EXTENT {
        image = image.thumbnail(MAX_PREVIEW_EXTENT, MAX_PREVIEW_EXTENT);
    }

    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}
