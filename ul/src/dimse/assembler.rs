//! Reassembles PDVs received on P-DATA-TF PDUs into complete DIMSE
//! messages (§4.5 "Message Assembler").

use std::collections::HashMap;

use crate::error::{InvalidPduSnafu, Result};
use crate::pdu::PresentationDataValue;
use snafu::ensure;

/// A fully reassembled DIMSE message: the command set bytes and, if the
/// command carried one, the dataset bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub presentation_context_id: u8,
    pub command: Vec<u8>,
    pub dataset: Option<Vec<u8>>,
}

#[derive(Debug, Default)]
struct PartialMessage {
    command: Vec<u8>,
    command_done: bool,
    dataset: Vec<u8>,
    dataset_started: bool,
    dataset_done: bool,
}

/// Per-presentation-context reassembly state. One instance serves an
/// entire association; contexts are independent of one another.
#[derive(Debug, Default)]
pub struct Assembler {
    partials: HashMap<u8, PartialMessage>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler { partials: HashMap::new() }
    }

    /// Feed one PDV. Returns `Ok(Some(message))` once its context's
    /// command (and, if one was started, dataset) stream is sealed by a
    /// last-fragment bit.
    ///
    /// A dataset fragment arriving before the command is sealed, or any
    /// fragment arriving after its stream was already sealed, is a
    /// protocol violation and is reported as [`crate::error::Error::InvalidPdu`]
    /// (§4.5: "fatal protocol errors... trigger an abort" — the caller
    /// is expected to abort the association on this error).
    pub fn feed(&mut self, pdv: PresentationDataValue) -> Result<Option<Message>> {
        let partial = self.partials.entry(pdv.presentation_context_id).or_default();

        if pdv.is_command {
            ensure!(!partial.command_done, InvalidPduSnafu);
            partial.command.extend_from_slice(&pdv.data);
            if pdv.is_last {
                partial.command_done = true;
            }
        } else {
            ensure!(partial.command_done, InvalidPduSnafu);
            ensure!(!partial.dataset_done, InvalidPduSnafu);
            partial.dataset_started = true;
            partial.dataset.extend_from_slice(&pdv.data);
            if pdv.is_last {
                partial.dataset_done = true;
            }
        }

        let complete = partial.command_done && (!partial.dataset_started || partial.dataset_done);
        if !complete {
            return Ok(None);
        }

        let partial = self.partials.remove(&pdv.presentation_context_id).expect("just inserted");
        Ok(Some(Message {
            presentation_context_id: pdv.presentation_context_id,
            command: partial.command,
            dataset: if partial.dataset_started { Some(partial.dataset) } else { None },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimse::command::CommandSet;
    use crate::dimse::fragmenter::fragment;
    use crate::pdu::Pdu;

    fn pdvs_from(pdus: Vec<Pdu>) -> Vec<PresentationDataValue> {
        pdus.into_iter()
            .flat_map(|p| match p {
                Pdu::PData { values } => values,
                _ => vec![],
            })
            .collect()
    }

    #[test]
    fn command_without_dataset_completes_on_last_command_pdv() {
        let command = CommandSet::c_echo_rq(1, "1.2.840.10008.1.1").encode();
        let pdus = fragment(&command, None, 1, 1024).unwrap();
        let mut assembler = Assembler::new();

        let mut result = None;
        for pdv in pdvs_from(pdus) {
            result = assembler.feed(pdv).unwrap();
        }
        let message = result.unwrap();
        assert_eq!(message.command, command);
        assert!(message.dataset.is_none());
    }

    #[test]
    fn fragmented_dataset_reassembles_in_order() {
        let command = CommandSet::c_store_rq(1, "1.2.840.10008.5.1.4.1.1.7", "1.2.3", crate::dimse::command::Priority::Medium).encode();
        let dataset = (0u8..=255).cycle().take(500).collect::<Vec<u8>>();
        let pdus = fragment(&command, Some(&dataset), 1, 112).unwrap();
        let mut assembler = Assembler::new();

        let mut result = None;
        for pdv in pdvs_from(pdus) {
            result = assembler.feed(pdv).unwrap();
        }
        let message = result.unwrap();
        assert_eq!(message.command, command);
        assert_eq!(message.dataset, Some(dataset));
    }

    #[test]
    fn dataset_fragment_before_command_sealed_is_rejected() {
        let mut assembler = Assembler::new();
        let early_dataset = PresentationDataValue {
            presentation_context_id: 1,
            is_command: false,
            is_last: true,
            data: vec![1, 2, 3],
        };
        let err = assembler.feed(early_dataset).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidPdu));
    }

    #[test]
    fn contexts_are_independent() {
        let mut assembler = Assembler::new();
        assembler
            .feed(PresentationDataValue {
                presentation_context_id: 1,
                is_command: true,
                is_last: false,
                data: vec![1],
            })
            .unwrap();
        // A concurrent message on a different context id proceeds independently.
        let done = assembler
            .feed(PresentationDataValue {
                presentation_context_id: 3,
                is_command: true,
                is_last: true,
                data: vec![9],
            })
            .unwrap();
        assert!(done.is_some());
        assert_eq!(done.unwrap().command, vec![9]);
    }
}
