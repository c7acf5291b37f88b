//! The association-requester half of the state machine: builds and
//! sends A-ASSOCIATE-RQ, then drives [`State::Open`] through to release
//! or abort (§4.4).

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use dicom_core::observability::{emit_audit, AuditEvent};
use dicom_core::AeTitle;
use snafu::{ensure, ResultExt};

use crate::association::{is_legal_awaiting_associate_ac, is_legal_in_open, NegotiatedAssociation, State, DEFAULT_ARTIM_TIMEOUT};
use crate::codec;
use crate::error::{
    ArtimTimerExpiredSnafu, AssociationRejectedSnafu, ConnectionFailedSnafu, InvalidAeTitleSnafu, InvalidStateSnafu,
    MissingAbstractSyntaxSnafu, Result, UnexpectedPduTypeSnafu,
};
use crate::pdu::{
    AbortSource, AssociateRq, Pdu, PresentationContextProposed, RjSource, UserIdentityRequest, UserVariableItem,
};

use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};

/// Default proposed transfer syntaxes, used when the caller does not
/// request any explicitly: Explicit VR LE, then Implicit VR LE.
fn default_transfer_syntaxes() -> Vec<String> {
    vec![
        "1.2.840.10008.1.2.1".to_string(),
        "1.2.840.10008.1.2".to_string(),
    ]
}

/// A builder for requesting and establishing an association as a
/// Service Class User (SCU).
///
/// ```no_run
/// # use dicom_ul::association::client::ClientAssociationOptions;
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let association = ClientAssociationOptions::new()
///     .calling_ae_title("MY_CLIENT")?
///     .called_ae_title("PACS_SERVER")?
///     .with_abstract_syntax("1.2.840.10008.1.1")
///     .establish("10.0.0.5:104")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientAssociationOptions {
    calling_ae_title: AeTitle,
    called_ae_title: AeTitle,
    application_context_name: String,
    abstract_syntaxes: Vec<String>,
    transfer_syntaxes: Vec<String>,
    protocol_version: u16,
    max_pdu_length: u32,
    implementation_class_uid: String,
    implementation_version_name: Option<String>,
    user_identity: Option<UserIdentityRequest>,
    connect_timeout: Duration,
    artim_timeout: Duration,
}

impl Default for ClientAssociationOptions {
    fn default() -> Self {
        ClientAssociationOptions {
            calling_ae_title: AeTitle::new("THIS-SCU").unwrap(),
            called_ae_title: AeTitle::new("ANY-SCP").unwrap(),
            application_context_name: "1.2.840.10008.3.1.1.1".to_string(),
            abstract_syntaxes: Vec::new(),
            transfer_syntaxes: Vec::new(),
            protocol_version: 1,
            max_pdu_length: 16384,
            implementation_class_uid: IMPLEMENTATION_CLASS_UID.to_string(),
            implementation_version_name: Some(IMPLEMENTATION_VERSION_NAME.to_string()),
            user_identity: None,
            connect_timeout: Duration::from_secs(30),
            artim_timeout: DEFAULT_ARTIM_TIMEOUT,
        }
    }
}

impl ClientAssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calling_ae_title(mut self, title: impl AsRef<str>) -> Result<Self> {
        self.calling_ae_title = AeTitle::new(title).context(InvalidAeTitleSnafu)?;
        Ok(self)
    }

    pub fn called_ae_title(mut self, title: impl AsRef<str>) -> Result<Self> {
        self.called_ae_title = AeTitle::new(title).context(InvalidAeTitleSnafu)?;
        Ok(self)
    }

    pub fn with_abstract_syntax(mut self, uid: impl Into<String>) -> Self {
        self.abstract_syntaxes.push(uid.into());
        self
    }

    pub fn with_transfer_syntax(mut self, uid: impl Into<String>) -> Self {
        self.transfer_syntaxes.push(uid.into());
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

    pub fn connect_timeout(mut self, value: Duration) -> Self {
        self.connect_timeout = value;
        self
    }

    pub fn user_identity(mut self, identity: UserIdentityRequest) -> Self {
        self.user_identity = Some(identity);
        self
    }

    fn build_request(&self) -> Result<AssociateRq> {
        ensure!(!self.abstract_syntaxes.is_empty(), MissingAbstractSyntaxSnafu);
        let transfer_syntaxes = if self.transfer_syntaxes.is_empty() {
            default_transfer_syntaxes()
        } else {
            self.transfer_syntaxes.clone()
        };

        let presentation_contexts: Vec<_> = self
            .abstract_syntaxes
            .iter()
            .enumerate()
            .map(|(i, abstract_syntax)| PresentationContextProposed {
                id: (i * 2 + 1) as u8,
                abstract_syntax: abstract_syntax.clone(),
                transfer_syntaxes: transfer_syntaxes.clone(),
            })
            .collect();

        let mut user_variables = vec![
            UserVariableItem::MaxLength(self.max_pdu_length),
            UserVariableItem::ImplementationClassUid(self.implementation_class_uid.clone()),
        ];
        if let Some(name) = &self.implementation_version_name {
            user_variables.push(UserVariableItem::ImplementationVersionName(name.clone()));
        }
        if let Some(identity) = &self.user_identity {
            user_variables.push(UserVariableItem::UserIdentity(identity.clone()));
        }

        Ok(AssociateRq {
            protocol_version: self.protocol_version,
            called_ae_title: self.called_ae_title.clone(),
            calling_ae_title: self.calling_ae_title.clone(),
            application_context_name: self.application_context_name.clone(),
            presentation_contexts,
            user_variables,
        })
    }

    /// Connect to `address` and negotiate an association. On success the
    /// returned [`ClientAssociation`] is in [`State::Open`].
    pub fn establish<A: ToSocketAddrs>(self, address: A) -> Result<ClientAssociation> {
        let request = self.build_request()?;
        let socket = TcpStream::connect(address).context(ConnectionFailedSnafu)?;
        self.establish_over(socket, request)
    }

    fn establish_over(self, mut socket: TcpStream, request: AssociateRq) -> Result<ClientAssociation> {
        let pdu = Pdu::AssociateRq(request.clone());
        codec::write_pdu(&mut socket, &pdu)?;

        socket.set_read_timeout(Some(self.artim_timeout)).context(ConnectionFailedSnafu)?;
        let response = read_with_artim(&mut socket, self.max_pdu_length, self.artim_timeout)?;

        if !is_legal_awaiting_associate_ac(&response) {
            let _ = codec::write_pdu(
                &mut socket,
                &Pdu::Abort {
                    source: AbortSource::ServiceProvider,
                    reason: 2, // unexpected PDU
                },
            );
            return UnexpectedPduTypeSnafu {
                expected: "A-ASSOCIATE-AC",
                received: response.kind_name(),
            }
            .fail();
        }

        match response {
            Pdu::AssociateAc(ac) => {
                let negotiated = NegotiatedAssociation::from_contexts(
                    &ac.presentation_contexts,
                    self.max_pdu_length,
                    peer_max_length(&ac.user_variables).unwrap_or(self.max_pdu_length),
                    &ac.user_variables,
                );
                emit_audit(AuditEvent::AssociationEstablished {
                    calling_ae: self.calling_ae_title.as_str().to_string(),
                    called_ae: self.called_ae_title.as_str().to_string(),
                });
                Ok(ClientAssociation {
                    socket,
                    state: State::Open,
                    negotiated,
                    proposed: request,
                    artim_timeout: self.artim_timeout,
                })
            }
            Pdu::AssociateRj { result, source } => {
                let source_name = match source {
                    RjSource::ServiceUser(_) => "service-user",
                    RjSource::ServiceProviderAcse(_) => "provider-acse",
                    RjSource::ServiceProviderPresentation(_) => "provider-presentation",
                };
                let reason = match source {
                    RjSource::ServiceUser(r) | RjSource::ServiceProviderAcse(r) | RjSource::ServiceProviderPresentation(r) => r,
                };
                emit_audit(AuditEvent::AssociationRejected {
                    calling_ae: self.calling_ae_title.as_str().to_string(),
                    called_ae: self.called_ae_title.as_str().to_string(),
                    reason: format!("{source_name} (reason {reason})"),
                });
                AssociationRejectedSnafu {
                    result,
                    source: source_name,
                    reason,
                }
                .fail()
            }
            Pdu::Abort { source, reason } => crate::error::AssociationAbortedSnafu { source, reason }.fail(),
            _ => unreachable!("filtered by is_legal_awaiting_associate_ac"),
        }
    }
}

fn peer_max_length(vars: &[UserVariableItem]) -> Option<u32> {
    vars.iter().find_map(|v| match v {
        UserVariableItem::MaxLength(v) => Some(*v),
        _ => None,
    })
}

/// Read one PDU, translating a socket read timeout into the ARTIM
/// timer's expiry error (§4.4 "ARTIM timer").
fn read_with_artim(socket: &mut TcpStream, max_pdu_size: u32, _artim_timeout: Duration) -> Result<Pdu> {
    match codec::decode_pdu(socket, max_pdu_size) {
        Ok(pdu) => Ok(pdu),
        Err(crate::error::Error::ConnectionFailed { source }) if matches!(source.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            ArtimTimerExpiredSnafu.fail()
        }
        Err(e) => Err(e),
    }
}

/// An established association from the requester's side.
///
/// Owns its TCP connection exclusively (§3 Association: "An Association
/// owns its connection exclusively"); DIMSE operations against it are
/// serialized by the caller, the core never interleaves two calls.
#[derive(Debug)]
pub struct ClientAssociation {
    socket: TcpStream,
    state: State,
    negotiated: NegotiatedAssociation,
    proposed: AssociateRq,
    artim_timeout: Duration,
}

impl ClientAssociation {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn negotiated(&self) -> &NegotiatedAssociation {
        &self.negotiated
    }

    /// The abstract syntax proposed for a given presentation context id,
    /// for callers matching a SOP class against its negotiated context.
    pub fn abstract_syntax_for(&self, context_id: u8) -> Option<&str> {
        self.proposed
            .presentation_contexts
            .iter()
            .find(|pc| pc.id == context_id)
            .map(|pc| pc.abstract_syntax.as_str())
    }

    /// Send a PDU. Legal only in [`State::Open`] or while releasing.
    pub fn send(&mut self, pdu: &Pdu) -> Result<()> {
        ensure!(
            matches!(self.state, State::Open | State::AwaitingReleaseRp),
            InvalidStateSnafu { state: self.state.name() }
        );
        codec::write_pdu(&mut self.socket, pdu)
    }

    /// Receive the next PDU. Enforces the legal-PDU set for
    /// [`State::Open`] (§4.4): anything else triggers a provider abort.
    pub fn receive(&mut self) -> Result<Pdu> {
        ensure!(self.state == State::Open, InvalidStateSnafu { state: self.state.name() });
        let pdu = codec::decode_pdu(&mut self.socket, self.negotiated.max_pdu_size)?;
        if !is_legal_in_open(&pdu) {
            self.abort();
            return UnexpectedPduTypeSnafu {
                expected: "P-DATA-TF, A-RELEASE-RQ, or A-ABORT",
                received: pdu.kind_name(),
            }
            .fail();
        }
        if let Pdu::Abort { source, reason } = pdu {
            self.state = State::Aborted;
            return crate::error::AssociationAbortedSnafu { source, reason }.fail();
        }
        Ok(pdu)
    }

    /// Gracefully release the association: send A-RELEASE-RQ and await
    /// A-RELEASE-RP.
    pub fn release(&mut self) -> Result<()> {
        ensure!(self.state == State::Open, InvalidStateSnafu { state: self.state.name() });
        codec::write_pdu(&mut self.socket, &Pdu::ReleaseRq)?;
        self.state = State::AwaitingReleaseRp;

        let _ = self.socket.set_read_timeout(Some(self.artim_timeout));
        let response = read_with_artim(&mut self.socket, self.negotiated.max_pdu_size, self.artim_timeout)?;
        match response {
            Pdu::ReleaseRp => {
                self.state = State::Closed;
                let _ = self.socket.shutdown(std::net::Shutdown::Both);
                emit_audit(AuditEvent::AssociationReleased {
                    calling_ae: self.proposed.calling_ae_title.as_str().to_string(),
                    called_ae: self.proposed.called_ae_title.as_str().to_string(),
                });
                Ok(())
            }
            Pdu::Abort { source, reason } => {
                self.state = State::Aborted;
                crate::error::AssociationAbortedSnafu { source, reason }.fail()
            }
            other => {
                self.abort();
                UnexpectedPduTypeSnafu {
                    expected: "A-RELEASE-RP",
                    received: other.kind_name(),
                }
                .fail()
            }
        }
    }

    /// Cooperative abort (§4.4 "Cancellation"), callable from any state.
    /// Sends A-ABORT(source=service-user) best-effort and transitions to
    /// [`State::Aborted`] without waiting for a response.
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            let _ = codec::write_pdu(
                &mut self.socket,
                &Pdu::Abort {
                    source: AbortSource::ServiceUser,
                    reason: 0,
                },
            );
            emit_audit(AuditEvent::AssociationAborted {
                calling_ae: self.proposed.calling_ae_title.as_str().to_string(),
                called_ae: self.proposed.called_ae_title.as_str().to_string(),
                reason: "local abort".to_string(),
            });
        }
        self.state = State::Aborted;
    }
}

impl Drop for ClientAssociation {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::server::ServerAssociationOptions;
    use std::net::TcpListener;

    #[test]
    fn associate_rq_negotiates_accepted_context() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let options = ServerAssociationOptions::new()
                .ae_title("PACS_SERVER")
                .unwrap()
                .with_supported_abstract_syntax("1.2.840.10008.1.1")
                .with_supported_transfer_syntax("1.2.840.10008.1.2.1");
            options.accept(stream).unwrap()
        });

        let client = ClientAssociationOptions::new()
            .calling_ae_title("MY_CLIENT")
            .unwrap()
            .called_ae_title("PACS_SERVER")
            .unwrap()
            .with_abstract_syntax("1.2.840.10008.1.1")
            .with_transfer_syntax("1.2.840.10008.1.2.1")
            .establish(addr)
            .unwrap();

        assert_eq!(client.state(), State::Open);
        assert_eq!(client.negotiated().transfer_syntax_for(1), Some("1.2.840.10008.1.2.1"));
        server.join().unwrap();
    }

    #[test]
    fn missing_abstract_syntax_is_rejected_client_side() {
        let err = ClientAssociationOptions::new().establish("127.0.0.1:1").unwrap_err();
        assert!(matches!(err, crate::error::Error::MissingAbstractSyntax));
    }
}
