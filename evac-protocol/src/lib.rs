pub mod evacuation;
pub mod feed;
pub mod registry;
pub mod scan;

pub mod prelude {
    pub use crate::evacuation::{
        ArrivalReport, ArrivalUpdate, EndSessionRequest, EvacuationSession, NewRosterEntry,
        NewSessionRequest, RosterEntry, RosterRow, SnapshotFailure, SnapshotReport,
    };
    pub use crate::feed::{parse_feed, Coordinate, FeedError, FeedPayload, Observation};
    pub use crate::registry::{Company, Person, Site, Team, TrackedAsset};
    pub use crate::scan::{NewScanRecord, PresentAsset, ScanOutcome, ScanRecord, ScanStatus};
}
