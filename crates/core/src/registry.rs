//! 函数注册表：稳定的符号名与可执行任务体之间的双向映射。

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, RwLock};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::Job;
use crate::{SchedulerError, SchedulerResult};

/// 任务执行上下文，作为任务函数的第一个参数
#[derive(Debug, Clone)]
pub struct JobContext {
    /// 超时或停止时被取消
    pub cancel: CancellationToken,
    pub run_id: Option<u64>,
}

impl JobContext {
    pub fn new(cancel: CancellationToken, run_id: Option<u64>) -> Self {
        Self { cancel, run_id }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub type JobOutput = anyhow::Result<Vec<u8>>;
pub type JobFuture = BoxFuture<'static, JobOutput>;

/// 可调度的任务体
pub trait JobFunc: Send + Sync + 'static {
    fn call(&self, ctx: JobContext, job: Job) -> JobFuture;
}

impl<F, Fut> JobFunc for F
where
    F: Fn(JobContext, Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobOutput> + Send + 'static,
{
    fn call(&self, ctx: JobContext, job: Job) -> JobFuture {
        Box::pin((self)(ctx, job))
    }
}

/// 共享的任务函数句柄
#[derive(Clone)]
pub struct JobFn(Arc<dyn JobFunc>);

impl JobFn {
    pub fn new<F: JobFunc>(func: F) -> Self {
        Self(Arc::new(func))
    }

    pub fn call(&self, ctx: JobContext, job: Job) -> JobFuture {
        self.0.call(ctx, job)
    }

    /// 是否指向同一个函数实例
    pub fn same_as(&self, other: &JobFn) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for JobFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JobFn")
    }
}

/// 由函数类型推导确定性的符号名
///
/// 对 `fn` 项返回其完整路径（如 `my_app::jobs::report`），同一份源码构建的进程间一致；
/// 闭包的名字不唯一，应使用 [`FunctionRegistry::register`] 显式命名。
pub fn symbol_name<F>() -> String {
    std::any::type_name::<F>().to_string()
}

/// 函数注册表
#[derive(Default)]
pub struct FunctionRegistry {
    funcs: RwLock<HashMap<String, JobFn>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以显式名字注册，重复注册覆盖旧值
    pub fn register<F: JobFunc>(&self, name: impl Into<String>, func: F) -> JobFn {
        let func = JobFn::new(func);
        self.register_job_fn(name, func.clone());
        func
    }

    /// 以类型路径作为名字注册，返回名字
    pub fn register_fn<F: JobFunc>(&self, func: F) -> String {
        let name = symbol_name::<F>();
        self.register(name.clone(), func);
        name
    }

    pub fn register_job_fn(&self, name: impl Into<String>, func: JobFn) {
        let name = name.into();
        debug!("注册任务函数: {}", name);
        self.funcs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, func);
    }

    pub fn lookup(&self, name: &str) -> SchedulerResult<JobFn> {
        self.funcs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::func_unregistered(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// 反向查找函数的注册名
    pub fn name_of(&self, func: &JobFn) -> Option<String> {
        self.funcs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(_, registered)| registered.same_as(func))
            .map(|(name, _)| name.clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .funcs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// 补全 `func_name` 并按名字绑定 `func`
    pub fn bind(&self, job: &mut Job) -> SchedulerResult<()> {
        if job.func_name.is_empty() {
            let func = job
                .func
                .as_ref()
                .ok_or_else(|| SchedulerError::InvalidJob("func_name 不能为空".to_string()))?;
            job.func_name = self
                .name_of(func)
                .ok_or_else(|| SchedulerError::func_unregistered("<anonymous>"))?;
        }
        job.func = Some(self.lookup(&job.func_name)?);
        Ok(())
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}
