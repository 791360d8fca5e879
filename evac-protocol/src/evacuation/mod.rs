mod arrival;
mod roster;
mod session;

pub use arrival::{ArrivalReport, ArrivalUpdate};
pub use roster::{NewRosterEntry, RosterEntry, RosterRow, SnapshotFailure, SnapshotReport};
pub use session::{EndSessionRequest, EvacuationSession, NewSessionRequest};
