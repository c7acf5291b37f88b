//! DIMSE messaging (§4.5): the command-set codec, PDV fragmentation and
//! reassembly, and status classification, layered over the PDU/
//! association machinery.

pub mod assembler;
pub mod command;
pub mod fragmenter;

pub use assembler::{Assembler, Message};
pub use command::{classify_status, CommandField, CommandSet, DatasetType, Priority, StatusClass};
pub use fragmenter::fragment;
