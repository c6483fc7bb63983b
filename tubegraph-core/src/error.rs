use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Platform API error: {0}")]
    PlatformApi(#[from] PlatformApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Channel lease held by another worker: {channel_id}")]
    LeaseHeld { channel_id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformApiError {
    #[error("API quota exhausted for credential ending in ...{key_suffix}")]
    QuotaExhausted { key_suffix: String },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Channel not found: {channel_id}")]
    ChannelNotFound { channel_id: String },

    #[error("Video not found: {video_id}")]
    VideoNotFound { video_id: String },

    #[error("Comments disabled for video: {video_id}")]
    CommentsDisabled { video_id: String },

    #[error("API returned error envelope: code {code}, {message}")]
    ErrorEnvelope { code: i64, message: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("No API credentials configured")]
    NoCredentials,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    #[error("Orphan reply discarded: parent {parent_id} does not exist")]
    OrphanReply { parent_id: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Empty graph for channel {channel_id}: no nodes to score")]
    EmptyGraph { channel_id: String },

    #[error("PageRank failed to converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("Unknown node identifier: {id}")]
    UnknownNode { id: String },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export directory not writable: {path}")]
    DirectoryNotWritable { path: String },

    #[error("Search not found: {search_id}")]
    SearchNotFound { search_id: i64 },

    #[error("Graph database error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Graph database connect timeout after {seconds} seconds")]
    ConnectTimeout { seconds: u64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
