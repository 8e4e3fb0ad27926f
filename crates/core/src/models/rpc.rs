use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SchedulerError;

/// 携带密码 SHA-256 摘要的请求头
pub const AUTH_HEADER: &str = "Auth-Password-SHA2";

/// JSON-RPC 请求信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: String,
    pub message: String,
}

/// JSON-RPC 响应信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn err(error: &SchedulerError) -> Self {
        Self {
            result: Value::Null,
            error: Some(RpcError::from(error)),
        }
    }

    /// 拆出结果，错误还原为 [`SchedulerError`]
    pub fn into_result(self) -> Result<Value, SchedulerError> {
        match self.error {
            Some(error) => Err(error.into_scheduler_error()),
            None => Ok(self.result),
        }
    }
}

impl From<&SchedulerError> for RpcError {
    fn from(error: &SchedulerError) -> Self {
        let message = match error {
            SchedulerError::JobNotFound { id } => id.clone(),
            SchedulerError::DuplicateJob { id } => id.clone(),
            SchedulerError::FuncUnregistered { name } => name.clone(),
            SchedulerError::InvalidJob(m)
            | SchedulerError::QueueNotFound(m)
            | SchedulerError::InvalidRequest(m)
            | SchedulerError::Store(m)
            | SchedulerError::Backend(m)
            | SchedulerError::Queue(m)
            | SchedulerError::Decode(m)
            | SchedulerError::Serialization(m)
            | SchedulerError::Configuration(m)
            | SchedulerError::Network(m)
            | SchedulerError::Internal(m) => m.clone(),
            other => other.to_string(),
        };
        Self {
            code: error.code().to_string(),
            message,
        }
    }
}

impl RpcError {
    pub fn into_scheduler_error(self) -> SchedulerError {
        let RpcError { code, message } = self;
        match code.as_str() {
            "JOB_NOT_FOUND" => SchedulerError::JobNotFound { id: message },
            "DUPLICATE_JOB" => SchedulerError::DuplicateJob { id: message },
            "FUNC_UNREGISTERED" => SchedulerError::FuncUnregistered { name: message },
            "INVALID_JOB" => SchedulerError::InvalidJob(message),
            "QUEUE_NOT_FOUND" => SchedulerError::QueueNotFound(message),
            "INVALID_REQUEST" => SchedulerError::InvalidRequest(message),
            "NO_LEADER" => SchedulerError::NoLeader,
            "UNAUTHORIZED" => SchedulerError::Unauthorized,
            "STORE_ERROR" | "DATABASE_ERROR" => SchedulerError::Store(message),
            "BACKEND_ERROR" => SchedulerError::Backend(message),
            "QUEUE_ERROR" => SchedulerError::Queue(message),
            "DECODE_ERROR" => SchedulerError::Decode(message),
            "SERIALIZATION_ERROR" => SchedulerError::Serialization(message),
            "CONFIGURATION_ERROR" => SchedulerError::Configuration(message),
            "NETWORK_ERROR" => SchedulerError::Network(message),
            _ => SchedulerError::Internal(message),
        }
    }
}
