//! 调度核心：定时循环、任务执行、运行记录、事件与队列分发。

pub mod broker;
pub mod cron_utils;
pub mod listener;
pub mod next_run;
pub mod recorder;
pub mod runner;
pub mod scheduler;

pub use broker::{Broker, QueueInfo};
pub use cron_utils::CronScheduler;
pub use listener::{EventCallback, Listener};
pub use next_run::{calc_next_run_time, next_fire_after};
pub use recorder::Recorder;
pub use runner::{JobRunner, RunOutcome};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerInfo};
