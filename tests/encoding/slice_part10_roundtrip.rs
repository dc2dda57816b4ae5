use dicom_dictionary_std::{tags, uids};
use dicom_object::{open_file, DefaultDicomObject};
use rand::rngs::StdRng;
use rand::SeedableRng;
use slicecast::config::{SeriesConfig, SynthesisConfig};
use slicecast::models::{Dimensions, SeriesContext, Slice};
use slicecast::{EncodedSlice, SliceEncoder, VolumeSynthesizer};

struct Fixture {
    context: SeriesContext,
    slice: Slice,
    encoded: EncodedSlice,
}

fn fixture(index: u32, total: u32, dims: Dimensions) -> Fixture {
    let synth = VolumeSynthesizer::new(SynthesisConfig::default());
    let context = SeriesContext::create(&SeriesConfig::default(), synth.config().geometry());
    let slice = synth
        .build_slice(&context, index, total, dims, &mut StdRng::seed_from_u64(17))
        .expect("slice");
    let encoded = SliceEncoder::new(120.0)
        .encode(&context.exam, &context.series, &slice, index)
        .expect("encode");
    Fixture {
        context,
        slice,
        encoded,
    }
}

fn reopen(encoded: &EncodedSlice) -> DefaultDicomObject {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("slice.dcm");
    std::fs::write(&path, encoded.bytes()).expect("write part 10");
    open_file(&path).expect("open written file")
}

fn text(obj: &DefaultDicomObject, tag: dicom_core::Tag) -> String {
    obj.element(tag)
        .expect("element present")
        .to_str()
        .expect("string value")
        .trim_end_matches(['\0', ' '])
        .to_string()
}

fn number(obj: &DefaultDicomObject, tag: dicom_core::Tag) -> f64 {
    obj.element(tag)
        .expect("element present")
        .to_float64()
        .expect("numeric value")
}

#[test]
fn test_identity_and_descriptive_fields() {
    let f = fixture(4, 10, Dimensions::new(32, 24));
    let obj = reopen(&f.encoded);

    assert_eq!(obj.meta().transfer_syntax(), uids::EXPLICIT_VR_LITTLE_ENDIAN);
    assert_eq!(obj.meta().media_storage_sop_class_uid(), uids::CT_IMAGE_STORAGE);
    assert_eq!(text(&obj, tags::SOP_CLASS_UID), uids::CT_IMAGE_STORAGE);
    assert_eq!(text(&obj, tags::SOP_INSTANCE_UID), f.slice.instance_uid.as_str());
    assert_eq!(text(&obj, tags::STUDY_INSTANCE_UID), f.context.exam.study_uid.as_str());
    assert_eq!(
        text(&obj, tags::SERIES_INSTANCE_UID),
        f.context.series.series_uid.as_str()
    );
    assert_eq!(
        text(&obj, tags::FRAME_OF_REFERENCE_UID),
        f.context.series.frame_of_reference_uid.as_str()
    );
    assert_eq!(text(&obj, tags::MODALITY), "CT");
    assert_eq!(text(&obj, tags::PATIENT_NAME), "MultiSlice^CT^Patient");
    assert_eq!(text(&obj, tags::PHOTOMETRIC_INTERPRETATION), "MONOCHROME2");
    assert_eq!(text(&obj, tags::RESCALE_TYPE), "HU");
    assert_eq!(number(&obj, tags::INSTANCE_NUMBER), 4.0);
    assert_eq!(number(&obj, tags::KVP), 120.0);
}

#[test]
fn test_geometry_fields() {
    let f = fixture(3, 10, Dimensions::new(32, 24));
    let obj = reopen(&f.encoded);

    assert_eq!(number(&obj, tags::ROWS), 24.0);
    assert_eq!(number(&obj, tags::COLUMNS), 32.0);
    assert_eq!(number(&obj, tags::BITS_ALLOCATED), 16.0);
    assert_eq!(number(&obj, tags::PIXEL_REPRESENTATION), 1.0);
    assert_eq!(number(&obj, tags::SLICE_THICKNESS), 2.0);
    assert_eq!(number(&obj, tags::SLICE_LOCATION), 6.0);

    let position = obj
        .element(tags::IMAGE_POSITION_PATIENT)
        .unwrap()
        .to_multi_float64()
        .unwrap();
    assert_eq!(position, vec![0.0, 0.0, 6.0]);
    let orientation = obj
        .element(tags::IMAGE_ORIENTATION_PATIENT)
        .unwrap()
        .to_multi_float64()
        .unwrap();
    assert_eq!(orientation, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let spacing = obj
        .element(tags::PIXEL_SPACING)
        .unwrap()
        .to_multi_float64()
        .unwrap();
    assert_eq!(spacing, vec![0.7, 0.7]);
}

#[test]
fn test_rescale_recovers_densities() {
    let f = fixture(2, 5, Dimensions::new(16, 16));
    let obj = reopen(&f.encoded);

    let slope = number(&obj, tags::RESCALE_SLOPE);
    let intercept = number(&obj, tags::RESCALE_INTERCEPT);
    let raw = obj.element(tags::PIXEL_DATA).unwrap().to_bytes().unwrap();
    assert_eq!(raw.len(), 16 * 16 * 2);

    let densities: Vec<i16> = raw
        .chunks_exact(2)
        .map(|b| (i16::from_le_bytes([b[0], b[1]]) as f64 * slope + intercept) as i16)
        .collect();
    assert_eq!(densities, f.slice.pixels.values());
}

#[test]
fn test_dataset_bytes_follow_the_meta_group() {
    let f = fixture(1, 1, Dimensions::new(8, 8));
    let bytes = f.encoded.bytes();
    let dataset = f.encoded.dataset();
    assert_eq!(&bytes[128..132], b"DICM");
    assert!(bytes.ends_with(&dataset[..]));
    // first dataset element belongs to group 0008
    assert_eq!(&dataset[..2], &[0x08, 0x00]);
}

#[test]
fn test_metadata_is_identical_across_encodings() {
    let f = fixture(5, 9, Dimensions::new(16, 16));
    let again = SliceEncoder::new(120.0)
        .encode(&f.context.exam, &f.context.series, &f.slice, 5)
        .expect("encode");
    assert_eq!(f.encoded.bytes(), again.bytes());

    let other = fixture(5, 9, Dimensions::new(16, 16));
    assert_ne!(other.encoded.sop_instance_uid, f.encoded.sop_instance_uid);
}
