//! 任务编解码：固定头部（魔数、版本、负载长度）加 JSON 负载。

use crate::models::Job;
use crate::registry::FunctionRegistry;
use crate::{SchedulerError, SchedulerResult};

const MAGIC: &[u8; 4] = b"CDNC";
const VERSION: u8 = 1;
const HEADER_LEN: usize = MAGIC.len() + 1 + 4;

/// Job 字节编解码器
pub struct JobCodec;

impl JobCodec {
    /// 编码任务，`func` 不进入字节流
    pub fn dump(job: &Job) -> SchedulerResult<Vec<u8>> {
        let payload = serde_json::to_vec(job)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| SchedulerError::Serialization("任务负载过大".to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// 解码但不绑定函数
    pub fn decode(bytes: &[u8]) -> SchedulerResult<Job> {
        if bytes.len() < HEADER_LEN {
            return Err(SchedulerError::Decode(format!(
                "字节流过短: {} 字节",
                bytes.len()
            )));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(SchedulerError::Decode("魔数不匹配".to_string()));
        }
        let version = bytes[MAGIC.len()];
        if version != VERSION {
            return Err(SchedulerError::Decode(format!("不支持的编码版本: {version}")));
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[MAGIC.len() + 1..HEADER_LEN]);
        let len = u32::from_be_bytes(len_bytes) as usize;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != len {
            return Err(SchedulerError::Decode(format!(
                "负载长度不符: 期望 {len}，实际 {}",
                payload.len()
            )));
        }

        serde_json::from_slice(payload).map_err(|e| SchedulerError::Decode(e.to_string()))
    }

    /// 解码并通过注册表重新绑定函数
    pub fn load(bytes: &[u8], registry: &FunctionRegistry) -> SchedulerResult<Job> {
        let mut job = Self::decode(bytes)?;
        if job.func_name.is_empty() {
            return Err(SchedulerError::func_unregistered(""));
        }
        registry.bind(&mut job)?;
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{JobContext, JobOutput};
    use serde_json::json;

    async fn noop(_ctx: JobContext, _job: Job) -> JobOutput {
        Ok(Vec::new())
    }

    fn sample() -> Job {
        Job::cron("report", "*/5 * * * *")
            .with_func_name("noop")
            .with_timezone("Europe/Berlin")
            .with_queues(vec!["q1".into()])
            .with_arg("n", json!(3))
    }

    #[test]
    fn test_load_rebinds_function() {
        let registry = FunctionRegistry::new();
        let func = registry.register("noop", noop);
        let mut job = sample();
        job.id = Job::generate_id();

        let loaded = JobCodec::load(&JobCodec::dump(&job).unwrap(), &registry).unwrap();
        assert_eq!(loaded, job);
        assert!(loaded.func.as_ref().unwrap().same_as(&func));
    }

    #[test]
    fn test_load_fails_for_unknown_function() {
        let registry = FunctionRegistry::new();
        let bytes = JobCodec::dump(&sample()).unwrap();
        assert!(matches!(
            JobCodec::load(&bytes, &registry),
            Err(SchedulerError::FuncUnregistered { .. })
        ));
    }

    #[test]
    fn test_truncated_and_malformed_input_rejected() {
        let bytes = JobCodec::dump(&sample()).unwrap();
        for cut in [0, 3, HEADER_LEN, bytes.len() - 1] {
            assert!(matches!(
                JobCodec::decode(&bytes[..cut]),
                Err(SchedulerError::Decode(_))
            ));
        }

        let mut wrong_version = bytes.clone();
        wrong_version[MAGIC.len()] = 9;
        assert!(matches!(JobCodec::decode(&wrong_version), Err(SchedulerError::Decode(_))));

        let mut garbage = bytes;
        let last = garbage.len() - 1;
        garbage[last] = b'!';
        assert!(matches!(JobCodec::decode(&garbage), Err(SchedulerError::Decode(_))));
    }
}
