//! Slice encoder
//!
//! Turns a synthesized [`Slice`] plus the run's exam/sub-series identity into a
//! DICOM Part 10 CT image: preamble, file meta group, then the dataset encoded
//! in Explicit VR Little Endian with the pixel payload last.

use bytes::Bytes;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::InMemDicomObject;
use dimse::StoreRequest;
use thiserror::Error;
use tracing::debug;

use crate::models::exam::{Exam, SubSeries};
use crate::models::identity::Uid;
use crate::models::slice::Slice;

/// Offset applied to every stored sample. Readers recover the density as
/// `stored * slope + intercept`.
pub const RESCALE_INTERCEPT: i32 = -1024;

pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.137038125948464847900039011591283709926";
pub const IMPLEMENTATION_VERSION_NAME: &str = "SLICECAST_01";

/// Preamble, `DICM` magic and the (0002,0000) group length element
const META_PREFIX_LEN: usize = 128 + 4 + 12;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("DICOM encoding failed: {0}")]
    Dicom(String),
}

/// A complete Part 10 object plus the identity needed to transfer it
#[derive(Debug, Clone)]
pub struct EncodedSlice {
    pub sop_class_uid: String,
    pub sop_instance_uid: Uid,
    pub transfer_syntax: String,
    pub ordinal: u32,
    bytes: Bytes,
    dataset_offset: usize,
}

impl EncodedSlice {
    /// The full Part 10 file
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Dataset without preamble or file meta group, as sent over DIMSE
    pub fn dataset(&self) -> Bytes {
        self.bytes.slice(self.dataset_offset..)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_store_request(&self) -> StoreRequest {
        StoreRequest::new(
            self.sop_class_uid.as_str(),
            self.sop_instance_uid.as_str(),
            self.transfer_syntax.as_str(),
            self.dataset(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SliceEncoder {
    kvp: f64,
}

impl SliceEncoder {
    pub fn new(kvp: f64) -> Self {
        Self { kvp }
    }

    /// Encode one slice. Deterministic for identical inputs.
    pub fn encode(
        &self,
        exam: &Exam,
        series: &SubSeries,
        slice: &Slice,
        ordinal: u32,
    ) -> Result<EncodedSlice, EncodeError> {
        let dims = slice.pixels.dimensions();
        check_geometry(slice)?;

        let object = self.build_object(exam, series, slice, ordinal);
        let file = object
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(slice.instance_uid.as_str())
                    .implementation_class_uid(IMPLEMENTATION_CLASS_UID)
                    .implementation_version_name(IMPLEMENTATION_VERSION_NAME),
            )
            .map_err(|e| EncodeError::Dicom(e.to_string()))?;

        let dataset_offset = META_PREFIX_LEN + file.meta().information_group_length as usize;
        let mut buffer = Vec::with_capacity(dataset_offset + dims.pixel_count() * 2 + 2048);
        file.write_all(&mut buffer)
            .map_err(|e| EncodeError::Dicom(e.to_string()))?;

        if dataset_offset >= buffer.len() {
            return Err(EncodeError::Dicom(format!(
                "dataset offset {} beyond encoded length {}",
                dataset_offset,
                buffer.len()
            )));
        }

        debug!(
            ordinal,
            instance = %slice.instance_uid,
            bytes = buffer.len(),
            "encoded slice"
        );

        Ok(EncodedSlice {
            sop_class_uid: uids::CT_IMAGE_STORAGE.to_string(),
            sop_instance_uid: slice.instance_uid.clone(),
            transfer_syntax: uids::EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
            ordinal,
            bytes: Bytes::from(buffer),
            dataset_offset,
        })
    }

    fn build_object(
        &self,
        exam: &Exam,
        series: &SubSeries,
        slice: &Slice,
        ordinal: u32,
    ) -> InMemDicomObject {
        let dims = slice.pixels.dimensions();
        let spatial = &slice.spatial;
        let date = exam.created_at.format("%Y%m%d").to_string();
        let time = exam.created_at.format("%H%M%S").to_string();
        let location = spatial.location_along(series.geometry.normal());
        let [row, column] = spatial.orientation;

        let elements = vec![
            text(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE),
            text(tags::SOP_INSTANCE_UID, VR::UI, slice.instance_uid.as_str()),
            text(tags::STUDY_DATE, VR::DA, &date),
            text(tags::SERIES_DATE, VR::DA, &date),
            text(tags::CONTENT_DATE, VR::DA, &date),
            text(tags::STUDY_TIME, VR::TM, &time),
            text(tags::SERIES_TIME, VR::TM, &time),
            text(tags::CONTENT_TIME, VR::TM, &time),
            text(tags::ACCESSION_NUMBER, VR::SH, &exam.accession_number),
            text(tags::MODALITY, VR::CS, &exam.modality),
            text(tags::STUDY_DESCRIPTION, VR::LO, &exam.description),
            text(tags::SERIES_DESCRIPTION, VR::LO, &series.description),
            text(tags::PATIENT_NAME, VR::PN, &exam.subject.name),
            text(tags::PATIENT_ID, VR::LO, &exam.subject.id),
            text(tags::PATIENT_BIRTH_DATE, VR::DA, &exam.subject.birth_date),
            text(tags::PATIENT_SEX, VR::CS, &exam.subject.sex),
            text(tags::KVP, VR::DS, &decimal(self.kvp)),
            text(tags::SLICE_THICKNESS, VR::DS, &decimal(spatial.slice_thickness)),
            text(tags::STUDY_INSTANCE_UID, VR::UI, exam.study_uid.as_str()),
            text(tags::SERIES_INSTANCE_UID, VR::UI, series.series_uid.as_str()),
            text(tags::STUDY_ID, VR::SH, &exam.study_id),
            text(tags::SERIES_NUMBER, VR::IS, &series.number.to_string()),
            text(tags::INSTANCE_NUMBER, VR::IS, &ordinal.to_string()),
            decimals(tags::IMAGE_POSITION_PATIENT, &spatial.position),
            decimals(
                tags::IMAGE_ORIENTATION_PATIENT,
                &[row[0], row[1], row[2], column[0], column[1], column[2]],
            ),
            text(
                tags::FRAME_OF_REFERENCE_UID,
                VR::UI,
                series.frame_of_reference_uid.as_str(),
            ),
            text(tags::SLICE_LOCATION, VR::DS, &decimal(location)),
            unsigned(tags::SAMPLES_PER_PIXEL, 1),
            text(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2"),
            unsigned(tags::ROWS, dims.height as u16),
            unsigned(tags::COLUMNS, dims.width as u16),
            decimals(tags::PIXEL_SPACING, &spatial.pixel_spacing),
            unsigned(tags::BITS_ALLOCATED, 16),
            unsigned(tags::BITS_STORED, 16),
            unsigned(tags::HIGH_BIT, 15),
            unsigned(tags::PIXEL_REPRESENTATION, 1),
            text(tags::RESCALE_INTERCEPT, VR::DS, &RESCALE_INTERCEPT.to_string()),
            text(tags::RESCALE_SLOPE, VR::DS, "1"),
            text(tags::RESCALE_TYPE, VR::LO, "HU"),
            DataElement::new(
                tags::PIXEL_DATA,
                VR::OW,
                PrimitiveValue::from(pixel_payload(slice.pixels.values())),
            ),
        ];

        InMemDicomObject::from_element_iter(elements)
    }
}

fn check_geometry(slice: &Slice) -> Result<(), EncodeError> {
    let dims = slice.pixels.dimensions();
    if dims.is_empty() {
        return Err(EncodeError::MalformedGeometry(format!(
            "empty pixel grid {}",
            dims
        )));
    }
    if dims.width > u16::MAX as u32 || dims.height > u16::MAX as u32 {
        return Err(EncodeError::MalformedGeometry(format!(
            "{} exceeds the 16-bit row/column limit",
            dims
        )));
    }
    let actual = slice.pixels.values().len();
    if actual != dims.pixel_count() {
        return Err(EncodeError::MalformedGeometry(format!(
            "{} declares {} pixels but the grid holds {}",
            dims,
            dims.pixel_count(),
            actual
        )));
    }
    Ok(())
}

/// Row-major little-endian 16-bit samples, shifted by the rescale intercept
fn pixel_payload(values: &[i16]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(values.len() * 2);
    for &value in values {
        let stored = (value as i32 - RESCALE_INTERCEPT) as i16;
        payload.extend_from_slice(&stored.to_le_bytes());
    }
    payload
}

fn text(tag: Tag, vr: VR, value: &str) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

fn unsigned(tag: Tag, value: u16) -> DataElement<InMemDicomObject> {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

fn decimals(tag: Tag, values: &[f64]) -> DataElement<InMemDicomObject> {
    DataElement::new(
        tag,
        VR::DS,
        PrimitiveValue::Strs(values.iter().map(|v| decimal(*v)).collect()),
    )
}

/// Decimal string no longer than the 16 characters DS allows
fn decimal(value: f64) -> String {
    // folds -0.0 into 0.0
    let value = value + 0.0;
    let plain = value.to_string();
    if plain.len() <= 16 {
        return plain;
    }
    for precision in (0..=12).rev() {
        let formatted = format!("{:.*}", precision, value);
        let trimmed = if formatted.contains('.') {
            formatted.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            formatted
        };
        if trimmed.len() <= 16 {
            return trimmed;
        }
    }
    format!("{:e}", value)
}
