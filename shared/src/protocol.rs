/// Primary broker endpoint queried for server topology
pub const DEFAULT_BROKER_URL: &str = "https://dec.quickconnect.to/Serv.php";

/// Broker endpoint used when the primary one cannot be reached
pub const FALLBACK_BROKER_URL: &str = "https://global.quickconnect.to/Serv.php";

/// Domain under which relay-region tunnel hosts live,
/// e.g. "<id>.<region>.quickconnect.to"
pub const RELAY_DOMAIN: &str = "quickconnect.to";

/// Identity probe path appended to every candidate base URL
pub const PINGPONG_PATH: &str = "/webman/pingpong.cgi?action=cors&quickconnect=true";

/// Portal family whose topology is requested
pub const DEFAULT_SERVER_TYPE: &str = "mainapp";

/// Suffixes appended to the server type to form the per-role query ids
pub const SECURE_ROLE_SUFFIX: &str = "_https";
pub const RELAY_ROLE_SUFFIX: &str = "_http";

/// Version field sent with every broker sub-query
pub const QUERY_VERSION: u32 = 1;

/// Literal the broker uses for a host it does not have
pub const ABSENT_HOST: &str = "NULL";

pub const DEFAULT_PROBE_CONCURRENCY: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PROBE_DEADLINE_MS: u64 = 20_000;
