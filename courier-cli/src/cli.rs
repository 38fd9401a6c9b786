use clap::Parser;
use courier_engine::ProxyType;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    author = "hua0512 <https://github.com/hua0512>",
    version,
    about = "Coalescing, conditionally cached JSON API client",
    long_about = "Issue requests against a JSON API through the courier client core.\n\
                  \n\
                  Identical concurrent requests share a single network call, responses\n\
                  carrying an ETag are revalidated with If-None-Match on later rounds,\n\
                  and fallback endpoints are tried in order when the primary is unreachable."
)]
pub struct CliArgs {
    /// Paths to request, relative to the base URL
    #[arg(required = true, help = "Request paths, resolved against --base-url")]
    pub paths: Vec<String>,

    /// Primary endpoint
    #[arg(
        short = 'u',
        long,
        help = "Primary API endpoint (e.g., \"https://api.example.com/v1/\")"
    )]
    pub base_url: String,

    /// Fallback endpoints
    #[arg(
        long = "fallback",
        help = "Fallback endpoint tried when the primary is unreachable (can be used multiple times)",
        value_name = "URL"
    )]
    pub fallbacks: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET", help = "HTTP method to use")]
    pub method: String,

    /// JSON request body
    #[arg(short = 'd', long, help = "JSON request body, sent with sorted keys")]
    pub data: Option<String>,

    /// Custom HTTP headers
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Identical concurrent requests per path
    #[arg(
        short = 'c',
        long,
        default_value = "1",
        help = "Number of identical concurrent requests issued per path"
    )]
    pub concurrency: usize,

    /// Number of sequential rounds
    #[arg(
        short = 'r',
        long,
        default_value = "1",
        help = "Repeat the whole batch this many times; later rounds revalidate cached responses"
    )]
    pub rounds: usize,

    /// Disable ETag revalidation
    #[arg(long, help = "Never send If-None-Match or store responses")]
    pub no_conditional: bool,

    /// Persist the conditional cache
    #[arg(long, help = "Directory for the on-disk conditional cache (default: in memory)")]
    pub cache_dir: Option<PathBuf>,

    /// Print response bodies
    #[arg(short = 'b', long = "body", help = "Print response bodies after the status line")]
    pub print_body: bool,

    /// Overall timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Overall timeout in seconds for HTTP requests (0 disables it)"
    )]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value = "10",
        help = "Connection timeout in seconds (time to establish initial connection)"
    )]
    pub connect_timeout: u64,

    /// Proxy URL (e.g., "http://proxy.example.com:8080")
    #[arg(
        long,
        help = "Proxy server URL (e.g., \"http://proxy.example.com:8080\")"
    )]
    pub proxy: Option<String>,

    /// Proxy type
    #[arg(long, value_enum, default_value = "all", help = "Proxy type")]
    pub proxy_type: ProxyType,

    /// Proxy username
    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// Disable all proxy settings
    #[arg(
        long,
        help = "Disable all proxy settings (including system proxy)"
    )]
    pub no_proxy: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
