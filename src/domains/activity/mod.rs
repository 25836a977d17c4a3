//! Activity trail: the `ActivityRecorded` subscriber and its read side

pub mod api;
pub mod routes;
pub mod service;

pub use service::{
    publish_after_commit, recorded, ActivityLogWriter, ListActivityLogs, ListActivityLogsHandler,
};

use super::Dependencies;
use crate::domain::ActivityRecorded;

pub fn register(deps: &Dependencies) {
    deps.bus
        .subscribe_to::<ActivityRecorded, _>(ActivityLogWriter::new(deps.activity_logs.clone()));
    deps.mediator
        .register::<ListActivityLogs, _>(ListActivityLogsHandler::new(deps.activity_logs.clone()));
}
