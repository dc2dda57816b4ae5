use std::sync::Arc;

use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::entries;
use dimse::{DimseScu, DimseStatus, ScuBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use slicecast::config::SynthesisConfig;
use slicecast::models::{Dimensions, SeriesContext};
use slicecast::transport::{ArchiveSession, DimseArchive, ReceiptCode};
use slicecast::{Orchestrator, SliceEncoder, Verdict, VolumeSynthesizer};

mod common;
use common::{closed_port, FakeArchive, SilentArchive};

fn encoded_slice(config: &slicecast::Config) -> slicecast::EncodedSlice {
    let synth = VolumeSynthesizer::new(SynthesisConfig::default());
    let context = SeriesContext::create(&config.series, synth.config().geometry());
    let slice = synth
        .build_slice(
            &context,
            1,
            1,
            Dimensions::new(32, 32),
            &mut StdRng::seed_from_u64(5),
        )
        .expect("slice");
    SliceEncoder::new(120.0)
        .encode(&context.exam, &context.series, &slice, 1)
        .expect("encode")
}

#[tokio::test]
async fn test_echo_against_fake_archive() {
    let archive = FakeArchive::start(0x0000, true);
    let config = archive.config();

    let scu = ScuBuilder::new()
        .local_aet("CT_SIMULATOR")
        .build()
        .expect("scu");
    assert!(scu.echo(&config.archive.remote_node()).await.expect("echo"));

    let session = DimseArchive::from_config(&config.archive);
    assert!(session.verify_connectivity().await);
    assert_eq!(archive.echoes.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_store_delivers_dataset() {
    let archive = FakeArchive::start(0x0000, true);
    let config = archive.config();
    let item = encoded_slice(&config);

    let session = DimseArchive::from_config(&config.archive);
    let receipt = session.store(&item).await;
    assert!(receipt.success, "store failed: {}", receipt.reason());
    assert_eq!(receipt.code, ReceiptCode::Dimse(0x0000));

    let received = archive.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].sop_instance_uid, item.sop_instance_uid.as_str());
    assert_eq!(received[0].dataset, item.dataset().to_vec());

    // what arrived is a readable Explicit VR Little Endian dataset
    let object = InMemDicomObject::read_dataset_with_ts(
        &received[0].dataset[..],
        &entries::EXPLICIT_VR_LITTLE_ENDIAN.erased(),
    )
    .expect("dataset parses");
    let rows = object
        .element(tags::ROWS)
        .expect("rows")
        .to_int::<u16>()
        .expect("rows value");
    assert_eq!(rows, 32);
}

#[tokio::test]
async fn test_failure_status_is_reported() {
    let archive = FakeArchive::start(0xA700, true);
    let config = archive.config();
    let item = encoded_slice(&config);

    let scu = DimseScu::new(config.archive.scu_config());
    let status = scu
        .store(&config.archive.remote_node(), item.to_store_request())
        .await
        .expect("exchange completes");
    assert_eq!(status, DimseStatus::Failure(0xA700));

    let session = DimseArchive::from_config(&config.archive);
    let receipt = session.store(&item).await;
    assert!(!receipt.success);
    assert_eq!(receipt.code, ReceiptCode::Dimse(0xA700));
}

#[tokio::test]
async fn test_unsupported_storage_is_rejected() {
    let archive = FakeArchive::start(0x0000, false);
    let config = archive.config();
    let item = encoded_slice(&config);

    let session = DimseArchive::from_config(&config.archive);
    let receipt = session.store(&item).await;
    assert!(!receipt.success);
    assert_eq!(receipt.code, ReceiptCode::Rejected);
    assert!(archive.received().is_empty());

    // the archive is still usable afterwards
    assert!(session.verify_connectivity().await);
}

#[tokio::test]
async fn test_full_run_over_dimse() {
    let archive = FakeArchive::start(0x0000, true);
    let mut config = archive.config();
    config.series.slice_count = 3;
    config.series.width = 32;
    config.series.height = 32;
    config.synthesis.seed = Some(11);
    config.transfer.pause_ms = 0;

    let session = Arc::new(DimseArchive::from_config(&config.archive));
    let orchestrator = Orchestrator::new(&config, session);
    let summary = orchestrator.run_configured().await;

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(orchestrator.verdict(&summary), Verdict::FullSuccess);
    assert_eq!(archive.received().len(), 3);
}

#[tokio::test]
async fn test_refused_connection_is_unreachable() {
    let archive = FakeArchive::start(0x0000, true);
    let mut config = archive.config();
    config.archive.port = closed_port();
    let item = encoded_slice(&config);

    let session = DimseArchive::from_config(&config.archive);
    assert!(!session.verify_connectivity().await);
    let receipt = session.store(&item).await;
    assert!(!receipt.success);
    assert_eq!(receipt.code, ReceiptCode::Unreachable);
}

#[tokio::test]
async fn test_silent_archive_times_out() {
    let archive = SilentArchive::start();
    let config = archive.config();
    let item = encoded_slice(&config);

    let session = DimseArchive::from_config(&config.archive);
    assert!(!session.verify_connectivity().await);
    let receipt = session.store(&item).await;
    assert!(!receipt.success);
    assert_eq!(receipt.code, ReceiptCode::Timeout, "{}", receipt.reason());
}

#[tokio::test]
async fn test_run_against_silent_archive_reports_failures() {
    let archive = SilentArchive::start();
    let mut config = archive.config();
    config.series.slice_count = 2;
    config.series.width = 16;
    config.series.height = 16;
    config.transfer.pause_ms = 0;
    config.transfer.require_verification = false;

    let session = Arc::new(DimseArchive::from_config(&config.archive));
    let orchestrator = Orchestrator::new(&config, session);
    let summary = orchestrator.run_configured().await;

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(orchestrator.verdict(&summary), Verdict::TotalFailure);
}
