//! The association-acceptor half of the state machine: reads an
//! inbound A-ASSOCIATE-RQ, negotiates presentation contexts against a
//! supported set, and responds with A-ASSOCIATE-AC or A-ASSOCIATE-RJ
//! (§4.4).

use std::net::TcpStream;
use std::time::Duration;

use dicom_core::AeTitle;
use snafu::{ensure, ResultExt};

use crate::association::{is_legal_in_open, NegotiatedAssociation, State, DEFAULT_ARTIM_TIMEOUT};
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use crate::codec;
use crate::error::{ConnectionFailedSnafu, InvalidAeTitleSnafu, InvalidStateSnafu, Result};
use crate::pdu::{
    AbortSource, AssociateAc, Pdu, PresentationContextResult, PresentationContextResultReason, UserVariableItem,
};

/// Access control policy applied to an inbound A-ASSOCIATE-RQ, checked
/// before presentation contexts are negotiated.
pub trait AccessControl: std::fmt::Debug {
    /// Return `Ok(())` to admit the request, or an RJ reason to reject
    /// the association outright.
    fn check_access(&self, called_ae_title: &AeTitle, calling_ae_title: &AeTitle) -> std::result::Result<(), u8>;
}

/// Admits every incoming association request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAny;

impl AccessControl for AcceptAny {
    fn check_access(&self, _called: &AeTitle, _calling: &AeTitle) -> std::result::Result<(), u8> {
        Ok(())
    }
}

/// Admits requests whose called AE title matches this node's configured
/// title exactly; rejects with "called AE title not recognized" (RJ
/// service-user reason `3`) otherwise.
#[derive(Debug, Clone)]
pub struct AcceptCalledAeTitle {
    expected: AeTitle,
}

impl AccessControl for AcceptCalledAeTitle {
    fn check_access(&self, called: &AeTitle, _calling: &AeTitle) -> std::result::Result<(), u8> {
        if called == &self.expected {
            Ok(())
        } else {
            Err(3)
        }
    }
}

/// A builder for accepting associations as a Service Class Provider
/// (SCP).
#[derive(Debug, Clone)]
pub struct ServerAssociationOptions {
    ae_title: AeTitle,
    application_context_name: String,
    supported_abstract_syntaxes: Vec<String>,
    supported_transfer_syntaxes: Vec<String>,
    max_pdu_length: u32,
    implementation_class_uid: String,
    implementation_version_name: Option<String>,
    access_control: AccessControlPolicy,
    artim_timeout: Duration,
}

#[derive(Debug, Clone)]
enum AccessControlPolicy {
    Any,
    CalledAeTitle,
}

impl Default for ServerAssociationOptions {
    fn default() -> Self {
        ServerAssociationOptions {
            ae_title: AeTitle::new("ANY-SCP").unwrap(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            supported_abstract_syntaxes: Vec::new(),
            supported_transfer_syntaxes: Vec::new(),
            max_pdu_length: 16384,
            implementation_class_uid: IMPLEMENTATION_CLASS_UID.to_string(),
            implementation_version_name: Some(IMPLEMENTATION_VERSION_NAME.to_string()),
            access_control: AccessControlPolicy::Any,
            artim_timeout: DEFAULT_ARTIM_TIMEOUT,
        }
    }
}

impl ServerAssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ae_title(mut self, title: impl AsRef<str>) -> Result<Self> {
        self.ae_title = AeTitle::new(title).context(InvalidAeTitleSnafu)?;
        Ok(self)
    }

    pub fn with_supported_abstract_syntax(mut self, uid: impl Into<String>) -> Self {
        self.supported_abstract_syntaxes.push(uid.into());
        self
    }

    pub fn with_supported_transfer_syntax(mut self, uid: impl Into<String>) -> Self {
        self.supported_transfer_syntaxes.push(uid.into());
        self
    }

    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    pub fn artim_timeout(mut self, value: Duration) -> Self {
        self.artim_timeout = value;
        self
    }

    /// Accept only requests whose called AE title matches [`ae_title`](Self::ae_title).
    pub fn accept_called_ae_title(mut self) -> Self {
        self.access_control = AccessControlPolicy::CalledAeTitle;
        self
    }

    /// Accept any incoming association request regardless of AE title
    /// (the default).
    pub fn accept_any(mut self) -> Self {
        self.access_control = AccessControlPolicy::Any;
        self
    }

    fn access_control(&self) -> Box<dyn AccessControl> {
        match self.access_control {
            AccessControlPolicy::Any => Box::new(AcceptAny),
            AccessControlPolicy::CalledAeTitle => Box::new(AcceptCalledAeTitle {
                expected: self.ae_title.clone(),
            }),
        }
    }

    /// Negotiate an association over an already-accepted [`TcpStream`].
    /// On success the returned [`ServerAssociation`] is in
    /// [`State::Open`], though it may carry zero accepted contexts (see
    /// [`ServerAssociation::ensure_usable`]).
    pub fn accept(self, mut socket: TcpStream) -> Result<ServerAssociation> {
        socket.set_read_timeout(Some(self.artim_timeout)).context(ConnectionFailedSnafu)?;
        let pdu = codec::decode_pdu(&mut socket, self.max_pdu_length)?;

        let request = match pdu {
            Pdu::AssociateRq(rq) => rq,
            other => {
                let _ = codec::write_pdu(
                    &mut socket,
                    &Pdu::Abort {
                        source: AbortSource::ServiceProvider,
                        reason: 2,
                    },
                );
                return crate::error::UnexpectedPduTypeSnafu {
                    expected: "A-ASSOCIATE-RQ",
                    received: other.kind_name(),
                }
                .fail();
            }
        };

        if let Err(reason) = self.access_control().check_access(&request.called_ae_title, &request.calling_ae_title) {
            let rj = Pdu::AssociateRj {
                result: crate::pdu::RjResult::Permanent,
                source: crate::pdu::RjSource::ServiceUser(reason),
            };
            codec::write_pdu(&mut socket, &rj)?;
            return crate::error::AssociationRejectedSnafu {
                result: crate::pdu::RjResult::Permanent,
                source: "service-user",
                reason,
            }
            .fail();
        }

        let peer_max_length = request
            .user_variables
            .iter()
            .find_map(|v| match v {
                UserVariableItem::MaxLength(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(self.max_pdu_length);

        let presentation_contexts: Vec<_> = request
            .presentation_contexts
            .iter()
            .map(|pc| self.negotiate_context(pc))
            .collect();

        let mut user_variables = vec![
            UserVariableItem::MaxLength(self.max_pdu_length),
            UserVariableItem::ImplementationClassUid(self.implementation_class_uid.clone()),
        ];
        if let Some(name) = &self.implementation_version_name {
            user_variables.push(UserVariableItem::ImplementationVersionName(name.clone()));
        }
        if let Some(UserVariableItem::UserIdentity(_)) = request.user_variables.iter().find(|v| matches!(v, UserVariableItem::UserIdentity(_))) {
            user_variables.push(UserVariableItem::UserIdentityResponse(crate::pdu::UserIdentityResponse {
                server_response: Vec::new(),
            }));
        }

        let ac = AssociateAc {
            protocol_version: request.protocol_version,
            called_ae_title: request.called_ae_title.clone(),
            calling_ae_title: request.calling_ae_title.clone(),
            application_context_name: self.application_context_name.clone(),
            presentation_contexts: presentation_contexts.clone(),
            user_variables,
        };
        codec::write_pdu(&mut socket, &Pdu::AssociateAc(ac))?;

        let negotiated = NegotiatedAssociation::from_contexts(
            &presentation_contexts,
            self.max_pdu_length,
            peer_max_length,
            &request.user_variables,
        );

        Ok(ServerAssociation {
            socket,
            state: State::Open,
            negotiated,
            calling_ae_title: request.calling_ae_title,
        })
    }

    fn negotiate_context(&self, proposed: &crate::pdu::PresentationContextProposed) -> PresentationContextResult {
        if !self.supported_abstract_syntaxes.is_empty() && !self.supported_abstract_syntaxes.contains(&proposed.abstract_syntax) {
            return PresentationContextResult {
                id: proposed.id,
                result: PresentationContextResultReason::AbstractSyntaxNotSupported,
                transfer_syntax: String::new(),
            };
        }

        let chosen = proposed
            .transfer_syntaxes
            .iter()
            .find(|ts| self.supported_transfer_syntaxes.is_empty() || self.supported_transfer_syntaxes.contains(ts));

        match chosen {
            Some(ts) => PresentationContextResult {
                id: proposed.id,
                result: PresentationContextResultReason::Acceptance,
                transfer_syntax: ts.clone(),
            },
            None => PresentationContextResult {
                id: proposed.id,
                result: PresentationContextResultReason::TransferSyntaxesNotSupported,
                transfer_syntax: String::new(),
            },
        }
    }
}

/// An established association from the acceptor's side.
#[derive(Debug)]
pub struct ServerAssociation {
    socket: TcpStream,
    state: State,
    negotiated: NegotiatedAssociation,
    calling_ae_title: AeTitle,
}

impl ServerAssociation {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn negotiated(&self) -> &NegotiatedAssociation {
        &self.negotiated
    }

    pub fn calling_ae_title(&self) -> &AeTitle {
        &self.calling_ae_title
    }

    /// Returns [`crate::error::Error::NoPresentationContextAccepted`] if
    /// negotiation left no usable context, for callers that want to
    /// bail out immediately rather than discover it on first use.
    pub fn ensure_usable(&self) -> Result<()> {
        if self.negotiated.accepted_contexts.is_empty() {
            crate::error::NoPresentationContextAcceptedSnafu.fail()
        } else {
            Ok(())
        }
    }

    pub fn send(&mut self, pdu: &Pdu) -> Result<()> {
        ensure!(
            matches!(self.state, State::Open | State::AwaitingReleaseRq),
            InvalidStateSnafu { state: self.state.name() }
        );
        codec::write_pdu(&mut self.socket, pdu)
    }

    /// Receive the next PDU, transparently answering A-RELEASE-RQ with
    /// A-RELEASE-RP and terminating the association (§4.4).
    pub fn receive(&mut self) -> Result<Pdu> {
        ensure!(self.state == State::Open, InvalidStateSnafu { state: self.state.name() });
        let pdu = codec::decode_pdu(&mut self.socket, self.negotiated.max_pdu_size)?;
        if !is_legal_in_open(&pdu) {
            self.abort();
            return crate::error::UnexpectedPduTypeSnafu {
                expected: "P-DATA-TF, A-RELEASE-RQ, or A-ABORT",
                received: pdu.kind_name(),
            }
            .fail();
        }
        match &pdu {
            Pdu::ReleaseRq => {
                codec::write_pdu(&mut self.socket, &Pdu::ReleaseRp)?;
                self.state = State::Closed;
                let _ = self.socket.shutdown(std::net::Shutdown::Both);
            }
            Pdu::Abort { source, reason } => {
                self.state = State::Aborted;
                return crate::error::AssociationAbortedSnafu {
                    source: *source,
                    reason: *reason,
                }
                .fail();
            }
            _ => {}
        }
        Ok(pdu)
    }

    /// Cooperative abort, callable from any state.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            let _ = codec::write_pdu(
                &mut self.socket,
                &Pdu::Abort {
                    source: AbortSource::ServiceUser,
                    reason: 0,
                },
            );
        }
        self.state = State::Aborted;
    }
}

impl Drop for ServerAssociation {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::client::ClientAssociationOptions;
    use std::net::TcpListener;

    #[test]
    fn rejects_unsupported_abstract_syntax() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            ServerAssociationOptions::new()
                .with_supported_abstract_syntax("1.2.840.10008.1.1")
                .with_supported_transfer_syntax("1.2.840.10008.1.2.1")
                .accept(stream)
                .unwrap()
        });

        let client = ClientAssociationOptions::new()
            .with_abstract_syntax("1.2.840.10008.5.1.4.1.1.7") // unsupported
            .with_transfer_syntax("1.2.840.10008.1.2.1")
            .establish(addr)
            .unwrap();

        assert!(client.negotiated().accepted_contexts.is_empty());
        let server_assoc = server.join().unwrap();
        assert!(server_assoc.ensure_usable().is_err());
    }

    #[test]
    fn called_ae_title_mismatch_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            ServerAssociationOptions::new()
                .ae_title("EXPECTED")
                .unwrap()
                .accept_called_ae_title()
                .with_supported_abstract_syntax("1.2.840.10008.1.1")
                .accept(stream)
        });

        let result = ClientAssociationOptions::new()
            .called_ae_title("WRONG")
            .unwrap()
            .with_abstract_syntax("1.2.840.10008.1.1")
            .establish(addr);

        assert!(result.is_err());
        assert!(server.join().unwrap().is_err());
    }
}
