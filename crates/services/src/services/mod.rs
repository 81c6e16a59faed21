pub mod authz;
pub mod config;
pub mod event_log;
pub mod stale_timer_reaper;
pub mod task_auto_creator;
pub mod timer;
pub mod timer_state;
