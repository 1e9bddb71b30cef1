use log::info;

use crate::name::Name;

/// Announces a new local LSA version to the flooding layer.
pub trait SyncPublisher {
    fn publish_update(&mut self, prefix: &Name, seq_no: u64);
}

/// Publisher used when no flooding transport is attached.
#[derive(Debug, Default)]
pub struct LoggingPublisher;

impl SyncPublisher for LoggingPublisher {
    fn publish_update(&mut self, prefix: &Name, seq_no: u64) {
        info!("Publishing {} seq={}", prefix, seq_no);
    }
}
