//! Splits a command-set (and optional dataset) byte blob into P-DATA-TF
//! PDUs bounded by the negotiated max-PDU size (§4.5 "Message
//! Fragmenter").

use crate::error::{InvalidPduSnafu, Result};
use crate::pdu::{Pdu, PresentationDataValue};
use snafu::ensure;

/// Fragment `command` (and, if present, `dataset`) into a sequence of
/// single-PDV P-DATA-TF PDUs for `presentation_context_id`.
///
/// Fragment size is `max_pdu_size - 6 (PDU envelope) - 6 (PDV header)`
/// (§4.5, rule 2). Command PDVs always precede dataset PDVs (rule 4);
/// the last PDV of each stream is marked accordingly (rule 3).
pub fn fragment(command: &[u8], dataset: Option<&[u8]>, presentation_context_id: u8, max_pdu_size: u32) -> Result<Vec<Pdu>> {
    let max_fragment = max_pdu_size.checked_sub(12).unwrap_or(0) as usize;
    ensure!(max_fragment > 0, InvalidPduSnafu);

    let mut pdus = Vec::new();
    push_fragments(&mut pdus, command, presentation_context_id, true, max_fragment);
    if let Some(dataset) = dataset {
        push_fragments(&mut pdus, dataset, presentation_context_id, false, max_fragment);
    }
    Ok(pdus)
}

fn push_fragments(pdus: &mut Vec<Pdu>, data: &[u8], context_id: u8, is_command: bool, max_fragment: usize) {
    if data.is_empty() {
        pdus.push(single_pdv(context_id, is_command, true, Vec::new()));
        return;
    }
    let chunks: Vec<&[u8]> = data.chunks(max_fragment).collect();
    let last_index = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        pdus.push(single_pdv(context_id, is_command, i == last_index, chunk.to_vec()));
    }
}

fn single_pdv(context_id: u8, is_command: bool, is_last: bool, data: Vec<u8>) -> Pdu {
    Pdu::PData {
        values: vec![PresentationDataValue {
            presentation_context_id: context_id,
            is_command,
            is_last,
            data,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_only_message_is_one_pdu() {
        let command = vec![1u8; 20];
        let pdus = fragment(&command, None, 1, 1024).unwrap();
        assert_eq!(pdus.len(), 1);
        match &pdus[0] {
            Pdu::PData { values } => {
                assert_eq!(values.len(), 1);
                assert!(values[0].is_command);
                assert!(values[0].is_last);
            }
            _ => panic!("expected P-DATA-TF"),
        }
    }

    #[test]
    fn large_dataset_splits_into_multiple_pdvs_with_one_last() {
        let command = vec![1u8; 8];
        let dataset = vec![2u8; 300];
        let pdus = fragment(&command, Some(&dataset), 3, 112).unwrap(); // max_fragment = 100

        let command_pdvs: Vec<_> = pdus
            .iter()
            .flat_map(|p| match p {
                Pdu::PData { values } => values.clone(),
                _ => vec![],
            })
            .filter(|v| v.is_command)
            .collect();
        let dataset_pdvs: Vec<_> = pdus
            .iter()
            .flat_map(|p| match p {
                Pdu::PData { values } => values.clone(),
                _ => vec![],
            })
            .filter(|v| !v.is_command)
            .collect();

        assert_eq!(command_pdvs.len(), 1);
        assert!(command_pdvs[0].is_last);

        assert_eq!(dataset_pdvs.len(), 3);
        assert_eq!(dataset_pdvs.iter().filter(|v| v.is_last).count(), 1);
        assert!(dataset_pdvs.last().unwrap().is_last);

        let reassembled: Vec<u8> = dataset_pdvs.iter().flat_map(|v| v.data.clone()).collect();
        assert_eq!(reassembled, dataset);
    }

    #[test]
    fn too_small_max_pdu_size_is_rejected() {
        let err = fragment(&[1, 2, 3], None, 1, 10).unwrap_err();
        assert!(matches!(err, crate::error::Error::InvalidPdu));
    }
}
