//! The ACSE association state machine (§4.4): negotiation, ARTIM timer,
//! PDU dispatch, release, and abort, layered over a reliable byte stream.
//!
//! The state machine itself (this module) is transport-agnostic and
//! synchronous, per the Design Notes' "async concurrency" strategy: it
//! is driven by [`client::ClientAssociation`] and [`server::ServerAssociation`],
//! which each own a blocking socket and funnel every wait through a
//! single ARTIM-bounded read.

pub mod client;
pub mod server;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::pdu::{Pdu, PresentationContextResult, UserVariableItem};

/// The default ARTIM timer duration (§4.4: "30s by convention").
pub const DEFAULT_ARTIM_TIMEOUT: Duration = Duration::from_secs(30);

/// Association lifecycle states, per PS3.8 §9.2 as simplified for the
/// services this toolkit provides (§4.4 States table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    AwaitingAssociateAc,
    AwaitingAssociateRq,
    Open,
    AwaitingReleaseRp,
    AwaitingReleaseRq,
    Aborted,
    Closed,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            State::Idle => "Idle",
            State::AwaitingAssociateAc => "AwaitingAssociateAc",
            State::AwaitingAssociateRq => "AwaitingAssociateRq",
            State::Open => "Open",
            State::AwaitingReleaseRp => "AwaitingReleaseRp",
            State::AwaitingReleaseRq => "AwaitingReleaseRq",
            State::Aborted => "Aborted",
            State::Closed => "Closed",
        }
    }

    /// Whether this state is a terminal state of the association.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Aborted | State::Closed)
    }
}

/// The outcome of a successful negotiation, exposed once the state
/// machine enters [`State::Open`] (§4.4 "Negotiation outcome").
#[derive(Debug, Clone)]
pub struct NegotiatedAssociation {
    /// Accepted presentation contexts, id -> negotiated transfer syntax.
    /// Only contexts with `result == Acceptance` are present.
    pub accepted_contexts: BTreeMap<u8, String>,
    /// `min(local-proposed, peer-proposed)`.
    pub max_pdu_size: u32,
    pub user_identity_server_response: Option<Vec<u8>>,
}

impl NegotiatedAssociation {
    pub(crate) fn from_contexts(
        contexts: &[PresentationContextResult],
        local_max_pdu: u32,
        peer_max_pdu: u32,
        user_variables: &[UserVariableItem],
    ) -> Self {
        let accepted_contexts = contexts
            .iter()
            .filter(|c| c.is_usable())
            .map(|c| (c.id, c.transfer_syntax.clone()))
            .collect();
        let user_identity_server_response = user_variables.iter().find_map(|v| match v {
            UserVariableItem::UserIdentityResponse(r) => Some(r.server_response.clone()),
            _ => None,
        });
        NegotiatedAssociation {
            accepted_contexts,
            max_pdu_size: local_max_pdu.min(peer_max_pdu),
            user_identity_server_response,
        }
    }

    /// The negotiated transfer syntax for an accepted presentation
    /// context, if any.
    pub fn transfer_syntax_for(&self, context_id: u8) -> Option<&str> {
        self.accepted_contexts.get(&context_id).map(String::as_str)
    }
}

/// Classify an inbound PDU against the set that is legal while in
/// [`State::Open`] (§4.4: "only P-DATA-TF, A-RELEASE-RQ, and A-ABORT are
/// legal inbound; anything else triggers an abort").
pub(crate) fn is_legal_in_open(pdu: &Pdu) -> bool {
    matches!(pdu, Pdu::PData { .. } | Pdu::ReleaseRq | Pdu::Abort { .. })
}

/// Classify an inbound PDU against the set legal while awaiting the
/// association response (§4.4: "on receipt of any PDU other than
/// A-ASSOCIATE-AC / A-ASSOCIATE-RJ / A-ABORT, send A-ABORT").
pub(crate) fn is_legal_awaiting_associate_ac(pdu: &Pdu) -> bool {
    matches!(pdu, Pdu::AssociateAc(_) | Pdu::AssociateRj { .. } | Pdu::Abort { .. })
}
