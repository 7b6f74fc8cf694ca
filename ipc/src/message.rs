//! Message types and the fixed-shape wire record

use core_types::Pid;
use resources::ResourceVector;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while encoding or validating messages
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Field {field} holds {value}, expected 0 or 1")]
    InvalidFlag { field: &'static str, value: u8 },

    #[error("Field {field} has {actual} classes, expected {expected}")]
    ClassCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Unexpected payload from {sender}: {reason}")]
    UnexpectedPayload { sender: Pid, reason: &'static str },
}

/// A message between the master and a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelMessage {
    /// Worker demands additional instances
    Request { sender: Pid, amounts: ResourceVector },
    /// Worker returns instances it holds
    ///
    /// `mass` marks the release half of an ordered re-acquisition.
    Release {
        sender: Pid,
        amounts: ResourceVector,
        mass: bool,
    },
    /// Worker is exiting; the master reclaims its whole row
    Terminating { sender: Pid },
    /// Master confirms a request or release has been applied
    Ack { sender: Pid, process_running: bool },
}

impl KernelMessage {
    /// The pid that sent this message
    pub fn sender(&self) -> Pid {
        match self {
            KernelMessage::Request { sender, .. }
            | KernelMessage::Release { sender, .. }
            | KernelMessage::Terminating { sender }
            | KernelMessage::Ack { sender, .. } => *sender,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            KernelMessage::Request { .. } => "request",
            KernelMessage::Release { mass: false, .. } => "release",
            KernelMessage::Release { mass: true, .. } => "mass-release",
            KernelMessage::Terminating { .. } => "terminating",
            KernelMessage::Ack { .. } => "ack",
        }
    }

    /// Lowers the message into a wire record addressed to `recipient`
    ///
    /// `classes` sizes the resource arrays of messages that carry none.
    pub fn to_record(&self, recipient: Pid, classes: usize) -> MessageRecord {
        let mut record = MessageRecord {
            recipient_tag: recipient.as_u32(),
            sender_pid: self.sender().as_u32(),
            request_or_release: 0,
            resource_request: vec![0; classes],
            resource_release: vec![0; classes],
            mass_release: 0,
            process_running: 1,
        };
        match self {
            KernelMessage::Request { amounts, .. } => {
                record.request_or_release = 1;
                record.resource_request = amounts.as_slice().to_vec();
            }
            KernelMessage::Release { amounts, mass, .. } => {
                record.resource_release = amounts.as_slice().to_vec();
                record.mass_release = u8::from(*mass);
            }
            KernelMessage::Terminating { .. } => {
                record.process_running = 0;
            }
            KernelMessage::Ack {
                process_running, ..
            } => {
                record.process_running = u8::from(*process_running);
            }
        }
        record
    }
}

impl fmt::Display for KernelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelMessage::Request { sender, amounts } => {
                write!(f, "request from {} [{}]", sender, amounts.delta_display())
            }
            KernelMessage::Release {
                sender,
                amounts,
                mass,
            } => write!(
                f,
                "{}release from {} [{}]",
                if *mass { "mass " } else { "" },
                sender,
                amounts.delta_display()
            ),
            KernelMessage::Terminating { sender } => write!(f, "terminating {}", sender),
            KernelMessage::Ack {
                sender,
                process_running,
            } => write!(f, "ack from {} (running={})", sender, process_running),
        }
    }
}

/// Fixed-shape wire record
///
/// Every frame on the mailbox has this layout regardless of message kind.
/// Flags are carried as `0`/`1` integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Pid of the intended reader
    pub recipient_tag: u32,
    pub sender_pid: u32,
    /// 1 for request, 0 for release
    pub request_or_release: u8,
    pub resource_request: Vec<u32>,
    pub resource_release: Vec<u32>,
    pub mass_release: u8,
    pub process_running: u8,
}

impl MessageRecord {
    pub fn recipient(&self) -> Pid {
        Pid::new(self.recipient_tag)
    }

    pub fn sender(&self) -> Pid {
        Pid::new(self.sender_pid)
    }

    /// Serializes the record into a transport frame
    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a transport frame
    pub fn decode(frame: &[u8]) -> Result<Self, MessageError> {
        Ok(serde_json::from_slice(frame)?)
    }

    /// Interprets a record read by the master
    ///
    /// Requests, releases and termination notices are what workers send. A
    /// frame shaped like an acknowledgement decodes as [`KernelMessage::Ack`]
    /// and is left for the reader to refuse. Any other empty request or
    /// release is rejected as an unexpected payload.
    pub fn into_inbound(self, classes: usize) -> Result<KernelMessage, MessageError> {
        self.check_shape(classes)?;
        let sender = self.sender();

        if self.process_running == 0 {
            return Ok(KernelMessage::Terminating { sender });
        }

        if self.is_ack_shaped() {
            return Ok(KernelMessage::Ack {
                sender,
                process_running: true,
            });
        }

        if self.request_or_release == 1 {
            let amounts = ResourceVector::from(self.resource_request);
            if amounts.is_zero() {
                return Err(MessageError::UnexpectedPayload {
                    sender,
                    reason: "request for zero instances",
                });
            }
            if self.resource_release.iter().any(|count| *count > 0) || self.mass_release == 1 {
                return Err(MessageError::UnexpectedPayload {
                    sender,
                    reason: "request carries release fields",
                });
            }
            Ok(KernelMessage::Request { sender, amounts })
        } else {
            let amounts = ResourceVector::from(self.resource_release);
            if amounts.is_zero() {
                return Err(MessageError::UnexpectedPayload {
                    sender,
                    reason: "release of zero instances",
                });
            }
            if self.resource_request.iter().any(|count| *count > 0) {
                return Err(MessageError::UnexpectedPayload {
                    sender,
                    reason: "release carries request fields",
                });
            }
            Ok(KernelMessage::Release {
                sender,
                amounts,
                mass: self.mass_release == 1,
            })
        }
    }

    /// Interprets a record read by a worker
    ///
    /// Workers only ever receive acknowledgements.
    pub fn into_ack(self, classes: usize) -> Result<KernelMessage, MessageError> {
        self.check_shape(classes)?;
        let sender = self.sender();
        if self.request_or_release != 0
            || self.mass_release != 0
            || self.resource_request.iter().any(|count| *count > 0)
            || self.resource_release.iter().any(|count| *count > 0)
        {
            return Err(MessageError::UnexpectedPayload {
                sender,
                reason: "acknowledgement carries resource fields",
            });
        }
        Ok(KernelMessage::Ack {
            sender,
            process_running: self.process_running == 1,
        })
    }

    fn is_ack_shaped(&self) -> bool {
        self.request_or_release == 0
            && self.mass_release == 0
            && self.resource_request.iter().all(|count| *count == 0)
            && self.resource_release.iter().all(|count| *count == 0)
    }

    fn check_shape(&self, classes: usize) -> Result<(), MessageError> {
        for (field, value) in [
            ("request_or_release", self.request_or_release),
            ("mass_release", self.mass_release),
            ("process_running", self.process_running),
        ] {
            if value > 1 {
                return Err(MessageError::InvalidFlag { field, value });
            }
        }
        for (field, len) in [
            ("resource_request", self.resource_request.len()),
            ("resource_release", self.resource_release.len()),
        ] {
            if len != classes {
                return Err(MessageError::ClassCountMismatch {
                    field,
                    expected: classes,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: Pid = Pid::new(1);
    const WORKER: Pid = Pid::new(42);

    #[test]
    fn test_request_record_layout() {
        let msg = KernelMessage::Request {
            sender: WORKER,
            amounts: [0, 2, 1].into(),
        };
        let record = msg.to_record(MASTER, 3);
        assert_eq!(record.recipient_tag, 1);
        assert_eq!(record.sender_pid, 42);
        assert_eq!(record.request_or_release, 1);
        assert_eq!(record.resource_request, vec![0, 2, 1]);
        assert_eq!(record.resource_release, vec![0, 0, 0]);
        assert_eq!(record.process_running, 1);
    }

    #[test]
    fn test_mass_release_decodes_with_flag() {
        let msg = KernelMessage::Release {
            sender: WORKER,
            amounts: [0, 0, 4].into(),
            mass: true,
        };
        let frame = msg.to_record(MASTER, 3).encode().unwrap();
        let decoded = MessageRecord::decode(&frame)
            .unwrap()
            .into_inbound(3)
            .unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_terminating_ignores_other_fields() {
        let record = KernelMessage::Terminating { sender: WORKER }.to_record(MASTER, 2);
        assert_eq!(record.process_running, 0);
        assert_eq!(
            record.into_inbound(2).unwrap(),
            KernelMessage::Terminating { sender: WORKER }
        );
    }

    #[test]
    fn test_ack_decodes_for_worker() {
        let ack = KernelMessage::Ack {
            sender: MASTER,
            process_running: true,
        };
        let record = ack.to_record(WORKER, 10);
        assert_eq!(record.recipient(), WORKER);
        assert_eq!(record.into_ack(10).unwrap(), ack);
    }

    #[test]
    fn test_ack_frame_at_master_decodes_as_ack() {
        let ack = KernelMessage::Ack {
            sender: WORKER,
            process_running: true,
        };
        assert_eq!(ack.to_record(MASTER, 2).into_inbound(2).unwrap(), ack);
    }

    #[test]
    fn test_empty_mass_release_rejected() {
        let mut record = KernelMessage::Release {
            sender: WORKER,
            amounts: [0, 1].into(),
            mass: true,
        }
        .to_record(MASTER, 2);
        record.resource_release = vec![0, 0];
        assert!(matches!(
            record.into_inbound(2),
            Err(MessageError::UnexpectedPayload {
                reason: "release of zero instances",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_flag_rejected() {
        let mut record = KernelMessage::Terminating { sender: WORKER }.to_record(MASTER, 2);
        record.mass_release = 7;
        assert!(matches!(
            record.into_inbound(2),
            Err(MessageError::InvalidFlag {
                field: "mass_release",
                value: 7
            })
        ));
    }

    #[test]
    fn test_class_count_mismatch_rejected() {
        let record = KernelMessage::Request {
            sender: WORKER,
            amounts: [1, 1].into(),
        }
        .to_record(MASTER, 2);
        assert!(matches!(
            record.into_inbound(3),
            Err(MessageError::ClassCountMismatch { expected: 3, .. })
        ));
    }

    #[test]
    fn test_garbage_frame_is_codec_error() {
        assert!(matches!(
            MessageRecord::decode(b"not a record"),
            Err(MessageError::Codec(_))
        ));
    }

    #[test]
    fn test_request_with_release_fields_rejected() {
        let mut record = KernelMessage::Request {
            sender: WORKER,
            amounts: [1, 0].into(),
        }
        .to_record(MASTER, 2);
        record.resource_release = vec![0, 1];
        assert!(matches!(
            record.into_inbound(2),
            Err(MessageError::UnexpectedPayload { .. })
        ));
    }

    #[test]
    fn test_display() {
        let msg = KernelMessage::Release {
            sender: WORKER,
            amounts: [2, 0, 1].into(),
            mass: true,
        };
        assert_eq!(msg.to_string(), "mass release from 42 [R0:2 R2:1]");
        assert_eq!(msg.kind(), "mass-release");
    }
}
