//! Error taxonomy for the store-and-forward queue (§4.7).

use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, snafu::Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("queue is full ({current}/{limit} {unit})"))]
    QueueFull { current: u64, limit: u64, unit: &'static str },

    #[snafu(display("queue is draining, no new items are accepted"))]
    Draining,

    #[snafu(display("no item with id {id}"))]
    NotFound { id: Uuid },

    #[snafu(display("failed to read/write {}: {source}", path.display()))]
    Io { path: PathBuf, source: std::io::Error },

    #[snafu(display("failed to (de)serialize metadata for {id}: {source}"))]
    Serialization { id: Uuid, source: serde_json::Error },

    #[snafu(display("malformed journal record at line {line}: {detail}"))]
    MalformedJournal { line: usize, detail: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
