use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::SeriesConfig;
use crate::models::identity::Uid;

/// Subject the exam belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// DICOM person name, `Family^Given`
    pub name: String,
    pub id: String,
    /// `YYYYMMDD`
    pub birth_date: String,
    pub sex: String,
}

/// One logical study. Created once per run and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub study_uid: Uid,
    pub subject: Subject,
    pub modality: String,
    pub description: String,
    pub study_id: String,
    pub accession_number: String,
    pub created_at: NaiveDateTime,
}

/// Acquisition parameters shared by every slice of a sub-series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionGeometry {
    /// Row and column direction cosines of the image plane
    pub orientation: [[f64; 3]; 2],
    /// Row spacing, column spacing (mm)
    pub pixel_spacing: [f64; 2],
    /// Nominal slice thickness (mm)
    pub slice_thickness: f64,
    /// Distance between consecutive slice positions along the normal (mm)
    pub slice_spacing: f64,
}

impl AcquisitionGeometry {
    /// Unit normal of the image plane (row × column)
    pub fn normal(&self) -> [f64; 3] {
        let [r, c] = self.orientation;
        let n = [
            r[1] * c[2] - r[2] * c[1],
            r[2] * c[0] - r[0] * c[2],
            r[0] * c[1] - r[1] * c[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len == 0.0 {
            return [0.0, 0.0, 0.0];
        }
        [n[0] / len, n[1] / len, n[2] / len]
    }
}

/// Sequence of slices sharing one acquisition geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSeries {
    pub series_uid: Uid,
    /// Shared by every slice so viewers place them in one coordinate system
    pub frame_of_reference_uid: Uid,
    pub number: u32,
    pub description: String,
    pub geometry: AcquisitionGeometry,
}

/// Exam and sub-series identity for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesContext {
    pub exam: Exam,
    pub series: SubSeries,
}

impl SeriesContext {
    /// Fresh identity pair from the configured descriptive fields
    pub fn create(config: &SeriesConfig, geometry: AcquisitionGeometry) -> Self {
        let created_at = chrono::Local::now().naive_local();
        let patient_id = config
            .patient_id
            .clone()
            .unwrap_or_else(|| format!("CT3D{}", chrono::Utc::now().timestamp()));

        let exam = Exam {
            study_uid: Uid::generate(),
            subject: Subject {
                name: config.patient_name.clone(),
                id: patient_id,
                birth_date: config.patient_birth_date.clone(),
                sex: config.patient_sex.clone(),
            },
            modality: config.modality.clone(),
            description: config.study_description.clone(),
            study_id: config.study_id.clone(),
            accession_number: config.accession_number.clone(),
            created_at,
        };

        let series = SubSeries {
            series_uid: Uid::generate(),
            frame_of_reference_uid: Uid::generate(),
            number: 1,
            description: config.series_description.clone(),
            geometry,
        };

        Self { exam, series }
    }
}
