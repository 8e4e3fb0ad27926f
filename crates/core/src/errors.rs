use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("任务未找到: {id}")]
    JobNotFound { id: String },

    #[error("任务已存在: {id}")]
    DuplicateJob { id: String },

    #[error("函数未注册: {name}")]
    FuncUnregistered { name: String },

    #[error("无效的任务: {0}")]
    InvalidJob(String),

    #[error("任务执行超时: {name} 超过 {timeout} - {cause}")]
    JobTimeout {
        name: String,
        timeout: String,
        cause: String,
    },

    #[error("没有可用的队列: {0}")]
    QueueNotFound(String),

    #[error("无效的请求: {0}")]
    InvalidRequest(String),

    #[error("集群当前没有主节点")]
    NoLeader,

    #[error("认证失败")]
    Unauthorized,

    #[error("存储错误: {0}")]
    Store(String),

    #[error("记录后端错误: {0}")]
    Backend(String),

    #[error("消息队列错误: {0}")]
    Queue(String),

    #[error("解码错误: {0}")]
    Decode(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SchedulerError {
    /// 稳定的错误码，供 RPC 接口返回
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) => "DATABASE_ERROR",
            SchedulerError::JobNotFound { .. } => "JOB_NOT_FOUND",
            SchedulerError::DuplicateJob { .. } => "DUPLICATE_JOB",
            SchedulerError::FuncUnregistered { .. } => "FUNC_UNREGISTERED",
            SchedulerError::InvalidJob(_) => "INVALID_JOB",
            SchedulerError::JobTimeout { .. } => "JOB_TIMEOUT",
            SchedulerError::QueueNotFound(_) => "QUEUE_NOT_FOUND",
            SchedulerError::InvalidRequest(_) => "INVALID_REQUEST",
            SchedulerError::NoLeader => "NO_LEADER",
            SchedulerError::Unauthorized => "UNAUTHORIZED",
            SchedulerError::Store(_) => "STORE_ERROR",
            SchedulerError::Backend(_) => "BACKEND_ERROR",
            SchedulerError::Queue(_) => "QUEUE_ERROR",
            SchedulerError::Decode(_) => "DECODE_ERROR",
            SchedulerError::Serialization(_) => "SERIALIZATION_ERROR",
            SchedulerError::Configuration(_) => "CONFIGURATION_ERROR",
            SchedulerError::Network(_) => "NETWORK_ERROR",
            SchedulerError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 驱动层的瞬时错误，重试可能成功
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SchedulerError::Database(_)
                | SchedulerError::Store(_)
                | SchedulerError::Backend(_)
                | SchedulerError::Queue(_)
                | SchedulerError::Network(_)
        )
    }

    pub fn job_not_found(id: impl Into<String>) -> Self {
        SchedulerError::JobNotFound { id: id.into() }
    }

    pub fn func_unregistered(name: impl Into<String>) -> Self {
        SchedulerError::FuncUnregistered { name: name.into() }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(SchedulerError::job_not_found("a").code(), "JOB_NOT_FOUND");
        assert_eq!(SchedulerError::NoLeader.code(), "NO_LEADER");
        assert_eq!(SchedulerError::Unauthorized.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_transient_classification() {
        assert!(SchedulerError::Queue("down".into()).is_transient());
        assert!(SchedulerError::Store("locked".into()).is_transient());
        assert!(!SchedulerError::InvalidJob("bad".into()).is_transient());
        assert!(!SchedulerError::func_unregistered("f").is_transient());
    }

    #[test]
    fn test_display_contains_context() {
        let err = SchedulerError::JobTimeout {
            name: "report".into(),
            timeout: "1s".into(),
            cause: "deadline".into(),
        };
        let text = err.to_string();
        assert!(text.contains("report"));
        assert!(text.contains("1s"));
    }
}
