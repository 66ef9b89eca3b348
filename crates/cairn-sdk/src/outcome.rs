use cairn_transport::WriteFailure;
use cairn_types::ObjectHash;

/// How one mirror fared during a serialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MirrorStatus {
    /// Every record was written.
    Complete,
    /// Some records could not be written; retry these hashes.
    Failed(Vec<WriteFailure>),
    /// The mirror was still writing when the completion timeout expired.
    TimedOut,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirrorReport {
    pub transport: String,
    pub status: MirrorStatus,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.status == MirrorStatus::Complete
    }

    /// Failed writes, empty unless the status is `Failed`.
    pub fn failures(&self) -> &[WriteFailure] {
        match &self.status {
            MirrorStatus::Failed(failures) => failures,
            _ => &[],
        }
    }
}

/// Result of a successful serialization.
///
/// Success means the primary transport holds every record. Mirrors may
/// still have failed; check [`is_complete`](Self::is_complete) or the
/// individual reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializeOutcome {
    pub root: ObjectHash,
    /// Distinct records written.
    pub records: usize,
    /// Canonical bytes across those records.
    pub bytes: u64,
    pub mirrors: Vec<MirrorReport>,
}

impl SerializeOutcome {
    /// `true` when every mirror completed as well.
    pub fn is_complete(&self) -> bool {
        self.mirrors.iter().all(MirrorReport::is_complete)
    }

    /// Mirrors that did not complete.
    pub fn incomplete_mirrors(&self) -> impl Iterator<Item = &MirrorReport> {
        self.mirrors.iter().filter(|report| !report.is_complete())
    }
}
