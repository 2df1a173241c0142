use crate::types::{GradingJob, GradingResult};
use redis::{AsyncCommands, RedisResult};

/// Redis queue semantics shared by every producer and the grading worker.
/// Keys are deterministic so producers can poll for a result by job id.

pub const QUEUE_PREFIX: &str = "senpai:queue";
pub const RESULT_PREFIX: &str = "senpai:result";
pub const STATUS_PREFIX: &str = "senpai:status";

/// Queue name for a language
pub fn queue_name(language: &str) -> String {
    format!("{}:{}", QUEUE_PREFIX, language.to_lowercase())
}

pub fn result_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, job_id)
}

pub fn status_key(job_id: &uuid::Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, job_id)
}

fn encode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

fn decode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
}

/// Push a grading job to its language queue
/// Uses RPUSH for FIFO semantics
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &GradingJob,
) -> RedisResult<()> {
    let queue = queue_name(&job.language);
    let payload = serde_json::to_string(job).map_err(encode_error)?;

    conn.rpush(&queue, payload).await
}

/// Pop the next grading job for a language
/// Uses BLPOP with timeout so the worker can notice shutdown
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    language: &str,
    timeout_seconds: f64,
) -> RedisResult<Option<GradingJob>> {
    let queue = queue_name(language);
    let result: Option<(String, String)> = conn.blpop(&queue, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: GradingJob = serde_json::from_str(&payload).map_err(decode_error)?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Store a grading result and its status under expiring keys
pub async fn store_result(
    conn: &mut redis::aio::ConnectionManager,
    result: &GradingResult,
    ttl_seconds: u64,
) -> RedisResult<()> {
    let key = result_key(&result.job_id);
    let payload = serde_json::to_string(result).map_err(encode_error)?;
    let _: () = conn.set_ex(&key, payload, ttl_seconds).await?;

    // Status separately for cheap polling
    let status = serde_json::to_string(&result.status).map_err(encode_error)?;
    let _: () = conn
        .set_ex(status_key(&result.job_id), status, ttl_seconds)
        .await?;

    Ok(())
}

pub async fn get_result(
    conn: &mut redis::aio::ConnectionManager,
    job_id: &uuid::Uuid,
) -> RedisResult<Option<GradingResult>> {
    let payload: Option<String> = conn.get(result_key(job_id)).await?;

    match payload {
        Some(data) => {
            let result: GradingResult = serde_json::from_str(&data).map_err(decode_error)?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_queue_naming() {
        assert_eq!(queue_name("python"), "senpai:queue:python");
        assert_eq!(queue_name("Python"), "senpai:queue:python");
    }

    #[test]
    fn test_result_key_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(result_key(&id), result_key(&id));
        assert!(result_key(&id).starts_with("senpai:result:"));
    }

    #[test]
    fn test_status_key_format() {
        let id = Uuid::new_v4();
        let key = status_key(&id);
        assert!(key.starts_with("senpai:status:"));
        assert!(key.contains(&id.to_string()));
    }
}
