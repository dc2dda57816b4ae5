//! Service Class User (SCU) implementation for outbound DIMSE operations
//!
//! Every operation opens its own association, performs exactly one exchange
//! and releases the association again. The blocking upper-layer exchange runs
//! on tokio's blocking pool under an outer deadline, so no call can hang the
//! caller indefinitely.

use std::io::Write;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_transfer_syntax_registry::entries;
use dicom_ul::pdu::{PDataValue, PDataValueType, Pdu};
use dicom_ul::ClientAssociationOptions;
use tracing::{debug, error, info, warn};

use crate::config::{RemoteNode, ScuConfig};
use crate::types::{AssociationState, DimseCommand, DimseStatus, StoreRequest};
use crate::{DimseError, Result, IMPLICIT_VR_LITTLE_ENDIAN, VERIFICATION_SOP_CLASS};

/// DIMSE Service Class User
pub struct DimseScu {
    config: ScuConfig,
    next_message_id: AtomicU16,
}

impl DimseScu {
    /// Create a new SCU with the given configuration
    pub fn new(config: ScuConfig) -> Self {
        Self {
            config,
            next_message_id: AtomicU16::new(1),
        }
    }

    /// The configuration this SCU was built with
    pub fn config(&self) -> &ScuConfig {
        &self.config
    }

    /// Send a C-ECHO request to a remote node.
    ///
    /// Returns `Ok(true)` only when the remote answers with the success
    /// status; any other status yields `Ok(false)`.
    pub async fn echo(&self, node: &RemoteNode) -> Result<bool> {
        info!("Sending C-ECHO to {}", node);

        // Validate the remote node configuration
        node.validate()?;

        let config = self.config.clone();
        let target = node.clone();
        let message_id = self.message_id();
        let status = self
            .run_bounded("C-ECHO", move || echo_blocking(&config, &target, message_id))
            .await?;

        if status.is_success() {
            info!("C-ECHO completed successfully");
        } else {
            warn!("C-ECHO answered with {}", status);
        }
        Ok(status.is_success())
    }

    /// Send a C-STORE request to a remote node and return the response status
    pub async fn store(&self, node: &RemoteNode, request: StoreRequest) -> Result<DimseStatus> {
        info!(
            "Sending C-STORE to {} (instance: {}, {} bytes)",
            node,
            request.sop_instance_uid,
            request.dataset.len()
        );

        // Validate the remote node configuration
        node.validate()?;

        let config = self.config.clone();
        let target = node.clone();
        let message_id = self.message_id();
        let status = self
            .run_bounded("C-STORE", move || {
                store_blocking(&config, &target, message_id, &request)
            })
            .await?;

        if status.is_success() {
            debug!("C-STORE completed successfully");
        } else {
            warn!("C-STORE answered with {}", status);
        }
        Ok(status)
    }

    /// Run a blocking exchange on the blocking pool, bounded by the
    /// association timeout
    async fn run_bounded<T, F>(&self, operation: &str, exchange: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = self.config.association_timeout();
        match tokio::time::timeout(deadline, tokio::task::spawn_blocking(exchange)).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                error!("{} worker failed: {}", operation, join_error);
                Err(DimseError::internal(format!(
                    "{} worker failed: {}",
                    operation, join_error
                )))
            }
            Err(_) => {
                error!("{} timed out after {:?}", operation, deadline);
                Err(DimseError::Timeout(format!(
                    "{} exceeded {:?}",
                    operation, deadline
                )))
            }
        }
    }

    fn message_id(&self) -> u16 {
        // 0 is not a valid message id; skip it on wrap-around
        loop {
            let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Get connection timeout for a node (uses node-specific or global setting)
    fn get_connection_timeout(config: &ScuConfig, node: &RemoteNode) -> Duration {
        node.connect_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.connect_timeout())
    }

    /// Get maximum PDU size for a node (uses node-specific or global setting)
    fn get_max_pdu(config: &ScuConfig, node: &RemoteNode) -> u32 {
        node.max_pdu.unwrap_or(config.max_pdu)
    }
}

/// Records the association lifecycle for one exchange
struct StateTracker {
    state: AssociationState,
    operation: DimseCommand,
}

impl StateTracker {
    fn new(operation: DimseCommand) -> Self {
        Self {
            state: AssociationState::Idle,
            operation,
        }
    }

    fn advance(&mut self, next: AssociationState) {
        if !self.state.can_transition_to(next) {
            warn!(
                "{:?}: unexpected association transition {:?} -> {:?}",
                self.operation, self.state, next
            );
        }
        debug!("{:?}: {:?} -> {:?}", self.operation, self.state, next);
        self.state = next;
    }
}

fn echo_blocking(config: &ScuConfig, node: &RemoteNode, message_id: u16) -> Result<DimseStatus> {
    let mut tracker = StateTracker::new(DimseCommand::Echo);
    tracker.advance(AssociationState::Negotiating);

    let establish = ClientAssociationOptions::new()
        .calling_ae_title(config.local_aet.as_str())
        .called_ae_title(node.ae_title.as_str())
        .max_pdu_length(DimseScu::get_max_pdu(config, node))
        .with_presentation_context(VERIFICATION_SOP_CLASS, vec![IMPLICIT_VR_LITTLE_ENDIAN])
        .connection_timeout(DimseScu::get_connection_timeout(config, node))
        .read_timeout(config.io_timeout())
        .write_timeout(config.io_timeout())
        .establish_with(&node.socket_address());

    // The association is released (or aborted) when dropped, which covers
    // every early return below.
    let mut association = match establish {
        Ok(association) => association,
        Err(e) => {
            let error = DimseError::from(e);
            warn!("Association with {} not established: {}", node, error);
            tracker.advance(AssociationState::Rejected);
            tracker.advance(AssociationState::Closed);
            return Err(error);
        }
    };

    let accepted = association.presentation_contexts().first().map(|pc| pc.id);
    let context_id = match accepted {
        Some(id) => id,
        None => {
            tracker.advance(AssociationState::Rejected);
            let _ = association.abort();
            tracker.advance(AssociationState::Closed);
            return Err(DimseError::AssociationRejected(
                "verification presentation context not accepted".into(),
            ));
        }
    };
    tracker.advance(AssociationState::Established);
    tracker.advance(AssociationState::Transferring);

    let exchange = command_pdu(context_id, &echo_command(message_id))
        .and_then(|pdu| association.send(&pdu).map_err(DimseError::from))
        .and_then(|_| {
            read_response(
                || association.receive().map_err(DimseError::from),
                DimseCommand::Echo,
                message_id,
            )
        });

    finish(tracker, exchange, move |graceful| {
        if graceful {
            association.release().err().map(|e| e.to_string())
        } else {
            let _ = association.abort();
            None
        }
    })
}

fn store_blocking(
    config: &ScuConfig,
    node: &RemoteNode,
    message_id: u16,
    request: &StoreRequest,
) -> Result<DimseStatus> {
    let mut tracker = StateTracker::new(DimseCommand::Store);
    tracker.advance(AssociationState::Negotiating);

    let establish = ClientAssociationOptions::new()
        .calling_ae_title(config.local_aet.as_str())
        .called_ae_title(node.ae_title.as_str())
        .max_pdu_length(DimseScu::get_max_pdu(config, node))
        .with_presentation_context(
            request.sop_class_uid.as_str(),
            vec![request.transfer_syntax.as_str()],
        )
        .connection_timeout(DimseScu::get_connection_timeout(config, node))
        .read_timeout(config.io_timeout())
        .write_timeout(config.io_timeout())
        .establish_with(&node.socket_address());

    let mut association = match establish {
        Ok(association) => association,
        Err(e) => {
            let error = DimseError::from(e);
            warn!("Association with {} not established: {}", node, error);
            tracker.advance(AssociationState::Rejected);
            tracker.advance(AssociationState::Closed);
            return Err(error);
        }
    };

    let accepted = association
        .presentation_contexts()
        .first()
        .map(|pc| (pc.id, pc.transfer_syntax.clone()));
    let context_id = match accepted {
        Some((id, ts)) if trim_uid(&ts) == request.transfer_syntax => id,
        other => {
            tracker.advance(AssociationState::Rejected);
            let _ = association.abort();
            tracker.advance(AssociationState::Closed);
            return Err(DimseError::AssociationRejected(match other {
                Some((_, ts)) => format!(
                    "remote accepted transfer syntax {} instead of {}",
                    trim_uid(&ts),
                    request.transfer_syntax
                ),
                None => format!("storage context {} not accepted", request.sop_class_uid),
            }));
        }
    };
    tracker.advance(AssociationState::Established);
    tracker.advance(AssociationState::Transferring);

    let command = store_command(
        &request.sop_class_uid,
        &request.sop_instance_uid,
        message_id,
    );
    let exchange = command_pdu(context_id, &command)
        .and_then(|pdu| association.send(&pdu).map_err(DimseError::from))
        .and_then(|_| {
            let mut writer = association.send_pdata(context_id);
            writer
                .write_all(&request.dataset)
                .map_err(|e| DimseError::DicomUl(format!("failed to send dataset: {}", e)))
            // dropping the writer flushes the last fragment
        })
        .and_then(|_| {
            read_response(
                || association.receive().map_err(DimseError::from),
                DimseCommand::Store,
                message_id,
            )
        });

    finish(tracker, exchange, move |graceful| {
        if graceful {
            association.release().err().map(|e| e.to_string())
        } else {
            let _ = association.abort();
            None
        }
    })
}

/// Tear the association down after an exchange, recording the outcome.
/// `teardown(true)` releases gracefully, `teardown(false)` aborts; a failed
/// exchange always aborts.
fn finish<F>(mut tracker: StateTracker, exchange: Result<DimseStatus>, teardown: F) -> Result<DimseStatus>
where
    F: FnOnce(bool) -> Option<String>,
{
    match exchange {
        Ok(status) => {
            if status.is_success() {
                tracker.advance(AssociationState::Succeeded);
            } else {
                tracker.advance(AssociationState::Failed);
            }
            if let Some(e) = teardown(true) {
                // the remote already answered; a messy release does not change the status
                warn!("Association release failed: {}", e);
            }
            tracker.advance(AssociationState::Closed);
            Ok(status)
        }
        Err(e) => {
            tracker.advance(AssociationState::Failed);
            teardown(false);
            tracker.advance(AssociationState::Closed);
            Err(e)
        }
    }
}

/// Single P-DATA-TF carrying a complete command set
fn command_pdu(context_id: u8, command: &InMemDicomObject) -> Result<Pdu> {
    Ok(Pdu::PData {
        data: vec![PDataValue {
            presentation_context_id: context_id,
            value_type: PDataValueType::Command,
            is_last: true,
            data: encode_command(command)?,
        }],
    })
}

/// Read P-DATA until a complete command set arrives and extract its status
fn read_response<R>(mut receive: R, command: DimseCommand, message_id: u16) -> Result<DimseStatus>
where
    R: FnMut() -> Result<Pdu>,
{
    let mut buffer = Vec::new();
    loop {
        match receive()? {
            Pdu::PData { data } => {
                let mut complete = false;
                for value in data {
                    if value.value_type != PDataValueType::Command {
                        continue;
                    }
                    buffer.extend_from_slice(&value.data);
                    complete |= value.is_last;
                }
                if complete {
                    break;
                }
            }
            Pdu::AbortRQ { .. } => {
                return Err(DimseError::operation_failed(format!(
                    "{:?} aborted by remote",
                    command
                )));
            }
            other => {
                return Err(DimseError::operation_failed(format!(
                    "unexpected PDU while waiting for {:?} response: {:?}",
                    command, other
                )));
            }
        }
    }

    let response = decode_command(&buffer)?;
    parse_response(&response, command, message_id)
}

fn parse_response(
    response: &InMemDicomObject,
    command: DimseCommand,
    message_id: u16,
) -> Result<DimseStatus> {
    let field = read_u16(response, tags::COMMAND_FIELD)?;
    if field != command.response_field() {
        return Err(DimseError::operation_failed(format!(
            "expected command field 0x{:04X}, got 0x{:04X}",
            command.response_field(),
            field
        )));
    }

    if let Ok(responded_to) = read_u16(response, tags::MESSAGE_ID_BEING_RESPONDED_TO) {
        if responded_to != message_id {
            return Err(DimseError::operation_failed(format!(
                "response for message {} while waiting for {}",
                responded_to, message_id
            )));
        }
    }

    let status = read_u16(response, tags::STATUS)?;
    Ok(DimseStatus::from_code(status))
}

fn read_u16(object: &InMemDicomObject, tag: dicom_core::Tag) -> Result<u16> {
    object
        .element(tag)
        .map_err(|e| DimseError::DicomObject(e.to_string()))?
        .to_int::<u16>()
        .map_err(|e| DimseError::DicomObject(e.to_string()))
}

/// C-ECHO-RQ command set
pub fn echo_command(message_id: u16) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(even_uid(VERIFICATION_SOP_CLASS)),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            PrimitiveValue::from(DimseCommand::Echo.request_field()),
        ),
        DataElement::new(tags::MESSAGE_ID, VR::US, PrimitiveValue::from(message_id)),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            PrimitiveValue::from(0x0101_u16),
        ),
    ])
}

/// C-STORE-RQ command set (medium priority, dataset follows)
pub fn store_command(sop_class_uid: &str, sop_instance_uid: &str, message_id: u16) -> InMemDicomObject {
    InMemDicomObject::command_from_element_iter([
        DataElement::new(
            tags::AFFECTED_SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(even_uid(sop_class_uid)),
        ),
        DataElement::new(
            tags::COMMAND_FIELD,
            VR::US,
            PrimitiveValue::from(DimseCommand::Store.request_field()),
        ),
        DataElement::new(tags::MESSAGE_ID, VR::US, PrimitiveValue::from(message_id)),
        DataElement::new(tags::PRIORITY, VR::US, PrimitiveValue::from(0x0000_u16)),
        DataElement::new(
            tags::COMMAND_DATA_SET_TYPE,
            VR::US,
            PrimitiveValue::from(0x0000_u16),
        ),
        DataElement::new(
            tags::AFFECTED_SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(even_uid(sop_instance_uid)),
        ),
    ])
}

/// Command sets are always Implicit VR Little Endian
pub fn encode_command(command: &InMemDicomObject) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    command
        .write_dataset_with_ts(&mut data, &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased())
        .map_err(|e| DimseError::DicomObject(format!("failed to encode command: {}", e)))?;
    Ok(data)
}

pub fn decode_command(data: &[u8]) -> Result<InMemDicomObject> {
    InMemDicomObject::read_dataset_with_ts(data, &entries::IMPLICIT_VR_LITTLE_ENDIAN.erased())
        .map_err(|e| DimseError::DicomObject(format!("failed to decode command: {}", e)))
}

/// UI values are padded to even length with a single NUL
fn even_uid(uid: &str) -> String {
    let mut value = uid.to_string();
    if value.len() % 2 == 1 {
        value.push('\0');
    }
    value
}

fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(['\0', ' '])
}

/// Builder for creating SCU instances with custom configurations
pub struct ScuBuilder {
    config: ScuConfig,
}

impl ScuBuilder {
    /// Start building a new SCU
    pub fn new() -> Self {
        Self {
            config: ScuConfig::default(),
        }
    }

    /// Set the local AE title
    pub fn local_aet(mut self, aet: impl Into<String>) -> Self {
        self.config.local_aet = aet.into();
        self
    }

    /// Set the connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the socket read/write timeout
    pub fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the whole-association deadline
    pub fn association_timeout(mut self, timeout: Duration) -> Self {
        self.config.association_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the maximum PDU size
    pub fn max_pdu(mut self, size: u32) -> Self {
        self.config.max_pdu = size;
        self
    }

    /// Build the SCU
    pub fn build(self) -> Result<DimseScu> {
        self.config.validate()?;
        Ok(DimseScu::new(self.config))
    }
}

impl Default for ScuBuilder {
    fn default() -> Self {
        Self::new()
    }
}
