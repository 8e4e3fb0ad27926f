use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use cadence_core::{Event, EventPkg};
use tracing::{debug, error};

pub type EventCallback = Arc<dyn Fn(EventPkg) + Send + Sync>;

/// 事件监听器
///
/// 每个订阅由事件掩码和回调组成，匹配的事件在独立任务中投递，
/// 回调 panic 只记录日志，不影响调度器。
#[derive(Clone, Default)]
pub struct Listener {
    callbacks: Vec<(Event, EventCallback)>,
}

impl Listener {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅事件，`mask` 可以用 `|` 组合多个事件
    pub fn subscribe<F>(mut self, mask: Event, callback: F) -> Self
    where
        F: Fn(EventPkg) + Send + Sync + 'static,
    {
        self.callbacks.push((mask, Arc::new(callback)));
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn emit(&self, pkg: EventPkg) {
        for (mask, callback) in &self.callbacks {
            if !mask.intersects(pkg.event) {
                continue;
            }
            let callback = Arc::clone(callback);
            let pkg = pkg.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { deliver(callback, pkg) });
                }
                Err(_) => deliver(callback, pkg),
            }
        }
    }
}

fn deliver(callback: EventCallback, pkg: EventPkg) {
    let event = pkg.event;
    let job_id = pkg.job_id.clone();
    debug!("投递事件 {:?} job_id={}", event, job_id);
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(pkg))) {
        error!(
            event = ?event,
            job_id = %job_id,
            "事件回调 panic: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// 提取 panic 负载中的文本
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_mask_filters_events() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let listener = Listener::new().subscribe(Event::JOB_ADDED | Event::JOB_DELETED, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        listener.emit(EventPkg::new(Event::JOB_ADDED, "a", Value::Null));
        listener.emit(EventPkg::new(Event::JOB_PAUSED, "a", Value::Null));
        listener.emit(EventPkg::new(Event::JOB_DELETED, "a", Value::Null));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_callback_is_isolated() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let listener = Listener::new()
            .subscribe(Event::ALL, |_| panic!("boom"))
            .subscribe(Event::ALL, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        listener.emit(EventPkg::new(Event::JOB_ERROR, "a", Value::Null));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("oops");
        assert_eq!(panic_message(payload.as_ref()), "oops");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
