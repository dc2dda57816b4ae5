use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dimse::{DimseError, DimseScu, RemoteNode};
use tracing::{debug, warn};

use crate::config::ArchiveConfig;
use crate::encoder::EncodedSlice;
use crate::transport::{ArchiveSession, ReceiptCode, StoreReceipt};

/// C-ECHO / C-STORE against a DICOM archive, one association per call
pub struct DimseArchive {
    scu: DimseScu,
    node: RemoteNode,
    closed: AtomicBool,
}

impl DimseArchive {
    pub fn new(scu: DimseScu, node: RemoteNode) -> Self {
        Self {
            scu,
            node,
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(DimseScu::new(config.scu_config()), config.remote_node())
    }

    pub fn node(&self) -> &RemoteNode {
        &self.node
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ArchiveSession for DimseArchive {
    async fn verify_connectivity(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.scu.echo(&self.node).await {
            Ok(alive) => alive,
            Err(e) => {
                warn!("C-ECHO to {} failed: {}", self.node, e);
                false
            }
        }
    }

    async fn store(&self, item: &EncodedSlice) -> StoreReceipt {
        if self.is_closed() {
            return StoreReceipt::failed(ReceiptCode::Closed, "store after close");
        }
        match self.scu.store(&self.node, item.to_store_request()).await {
            Ok(status) if status.is_success() => {
                StoreReceipt::stored(ReceiptCode::Dimse(status.code()))
            }
            Ok(status) => StoreReceipt::failed(ReceiptCode::Dimse(status.code()), status.to_string()),
            Err(e) => StoreReceipt::failed(receipt_code(&e), e.to_string()),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("DIMSE session to {} closed", self.node);
        }
    }

    fn describe(&self) -> String {
        format!("DIMSE {}", self.node)
    }
}

fn receipt_code(error: &DimseError) -> ReceiptCode {
    match error {
        e if e.is_negotiation_failure() => ReceiptCode::Rejected,
        DimseError::Timeout(_) => ReceiptCode::Timeout,
        DimseError::Network(_) => ReceiptCode::Unreachable,
        _ => ReceiptCode::Error,
    }
}
