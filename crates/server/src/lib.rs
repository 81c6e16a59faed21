use std::sync::Arc;

use db::DBService;
use services::services::{
    authz::{Actor, StaffId, StaffRoster},
    config::Config,
    task_auto_creator::TaskAutoCreator,
    timer::TimerService,
};

pub mod error;
pub mod routes;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    roster: Arc<StaffRoster>,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> Self {
        let roster = Arc::new(config.roster());
        Self {
            db,
            config: Arc::new(config),
            roster,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn actor(&self, staff_id: StaffId) -> Actor {
        self.roster.actor(staff_id)
    }

    pub fn timers(&self) -> TimerService {
        TimerService::new(self.db.pool.clone())
    }

    pub fn task_creator(&self) -> TaskAutoCreator {
        TaskAutoCreator::new(self.db.pool.clone())
    }
}
