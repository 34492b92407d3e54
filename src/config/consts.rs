/// Queue on which workers report job status back to the broker
pub const STATUS_QUEUE: &str = "ocrd-processing-status";
/// Default durable stream holding every processing queue
pub const DEFAULT_STREAM_NAME: &str = "OCRD_PROCESSING";
/// Subject prefix under which queue names are published
pub const SUBJECT_PREFIX: &str = "ocrd.processing";
/// Default message broker port
pub const DEFAULT_QUEUE_PORT: u16 = 4222;
/// Default image used when the message broker is deployed as a container
pub const DEFAULT_QUEUE_IMAGE: &str = "nats:2.10";
/// Default image used when the database is deployed as a container
pub const DEFAULT_DATABASE_IMAGE: &str = "mongo:7";
/// Default directory for per-job log files
pub const DEFAULT_LOGS_DIR: &str = "/tmp/ocrd_network_logs";
/// Default executable used to start native workers
pub const DEFAULT_WORKER_COMMAND: &str = "processing-broker";
/// Seconds allowed for stopping a single agent before giving up on it
pub const DEFAULT_AGENT_STOP_SECONDS: u64 = 10;
/// Publish attempts before `ChannelUnavailable` reaches the caller
pub const DEFAULT_PUBLISH_ATTEMPTS: usize = 3;
/// Initial publish retry delay in milliseconds (doubles per attempt)
pub const DEFAULT_PUBLISH_BACKOFF_MS: u64 = 200;
/// Deliveries of one message before it is dropped as poison
pub const MAX_DELIVERY_ATTEMPTS: u32 = 5;
/// Default SSH port for remote hosts
pub const DEFAULT_SSH_PORT: u16 = 22;
/// Environment variable carrying the queue password to native workers
pub const WORKER_PASSWORD_ENV: &str = "PROCESSING_QUEUE_PASSWORD";
/// System-wide resource directory searched after the user data directory
pub const SYSTEM_RESOURCE_DIR: &str = "/usr/local/share/ocrd-resources";
/// Name of the resource directory below the user data directory
pub const RESOURCE_DIR_NAME: &str = "ocrd-resources";
/// Seconds a delivered message may stay unacknowledged before redelivery
pub const CONSUMER_ACK_WAIT_SECONDS: u64 = 3600;
