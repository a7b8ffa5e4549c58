//! Runtime configuration for the ingestion loop, parsed from the environment
//! variables named in the reference job's `__main__` block.

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub queue_url: String,
    pub region: String,
    pub max_batch_size: u32,
    pub visibility_timeout_buffer: u32,
    pub wait_time_seconds: u32,
    pub poll_interval_seconds: u32,
    pub max_batches: Option<u32>,
    pub dispatch_job_id: Option<String>,
    pub metadata_table: String,
}

impl IngestionConfig {
    /// Loads configuration from the environment, applying the same defaults
    /// as the reference job: `MAX_BATCH_SIZE=50`, `VISIBILITY_TIMEOUT_BUFFER=120`,
    /// `WAIT_TIME_SECONDS=20`, `POLL_INTERVAL_SECONDS=5`, `MAX_BATCHES` unset
    /// (run forever), `METADATA_TABLE=lakehouse.raw_ingestion_metadata`.
    pub fn from_env() -> Result<Self, String> {
        let queue_url = std::env::var("INGESTION_QUEUE_URL").map_err(|_| "INGESTION_QUEUE_URL is required".to_string())?;
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let max_batch_size = env_u32("MAX_BATCH_SIZE", 50)?;
        let visibility_timeout_buffer = env_u32("VISIBILITY_TIMEOUT_BUFFER", 120)?;
        let wait_time_seconds = env_u32("WAIT_TIME_SECONDS", 20)?;
        let poll_interval_seconds = env_u32("POLL_INTERVAL_SECONDS", 5)?;
        let max_batches = match std::env::var("MAX_BATCHES") {
            Ok(raw) => {
                let parsed = raw.parse::<u32>().map_err(|_| format!("MAX_BATCHES must be numeric, got: {raw}"))?;
                if parsed == 0 {
                    None
                } else {
                    Some(parsed)
                }
            }
            Err(_) => None,
        };
        let dispatch_job_id = std::env::var("DISPATCH_JOB_ID").ok().filter(|s| !s.is_empty());
        let metadata_table = std::env::var("METADATA_TABLE").unwrap_or_else(|_| "lakehouse.raw_ingestion_metadata".to_string());

        Ok(Self {
            queue_url,
            region,
            max_batch_size,
            visibility_timeout_buffer,
            wait_time_seconds,
            poll_interval_seconds,
            max_batches,
            dispatch_job_id,
            metadata_table,
        })
    }
}

fn env_u32(name: &str, default: u32) -> Result<u32, String> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<u32>().map_err(|_| format!("{name} must be numeric, got: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_numeric_batch_size() {
        std::env::set_var("INGESTION_QUEUE_URL", "https://example.com/queue");
        std::env::set_var("MAX_BATCH_SIZE", "not-a-number");
        let result = IngestionConfig::from_env();
        std::env::remove_var("INGESTION_QUEUE_URL");
        std::env::remove_var("MAX_BATCH_SIZE");
        assert!(result.is_err());
    }

    #[test]
    fn zero_max_batches_means_unbounded() {
        std::env::set_var("INGESTION_QUEUE_URL", "https://example.com/queue");
        std::env::set_var("MAX_BATCHES", "0");
        let config = IngestionConfig::from_env().unwrap();
        std::env::remove_var("INGESTION_QUEUE_URL");
        std::env::remove_var("MAX_BATCHES");
        assert_eq!(config.max_batches, None);
    }
}
