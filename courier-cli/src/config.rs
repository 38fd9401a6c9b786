use std::time::Duration;

use courier_engine::{ApiRequest, ClientConfig, ProxyConfig};
use reqwest::Method;
use tracing::info;

use crate::cli::CliArgs;
use crate::error::AppError;
use crate::utils::parse_headers;

/// Configuration for the entire program
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    /// Client core configuration
    pub client_config: ClientConfig,

    /// Method for every request
    pub method: Method,

    /// Parsed JSON body, if any
    pub body: Option<serde_json::Value>,

    /// Force revalidation off for every request
    pub no_conditional: bool,

    /// Identical concurrent requests per path
    pub concurrency: usize,

    /// Sequential rounds
    pub rounds: usize,

    /// Whether bodies are printed
    pub print_body: bool,
}

impl ProgramConfig {
    pub fn from_args(args: &CliArgs) -> Result<Self, AppError> {
        let method = args
            .method
            .to_ascii_uppercase()
            .parse::<Method>()
            .map_err(|_| AppError::InvalidInput(format!("Invalid HTTP method: '{}'", args.method)))?;

        let body = args
            .data
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| AppError::InvalidInput(format!("Request body is not valid JSON: {e}")))?;

        if args.concurrency == 0 || args.rounds == 0 {
            return Err(AppError::InvalidInput(
                "--concurrency and --rounds must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            client_config: client_config(args)?,
            method,
            body,
            no_conditional: args.no_conditional,
            concurrency: args.concurrency,
            rounds: args.rounds,
            print_body: args.print_body,
        })
    }

    /// Build the request for `path`
    pub fn request(&self, path: &str) -> Result<ApiRequest, AppError> {
        let mut request = ApiRequest::new(self.method.clone(), path);
        if let Some(body) = &self.body {
            request = request.json(body)?;
        }
        if self.no_conditional {
            request = request.conditional(false);
        }
        Ok(request)
    }
}

fn client_config(args: &CliArgs) -> Result<ClientConfig, AppError> {
    let mut builder = ClientConfig::builder()
        .with_base_url(&args.base_url)
        .with_fallback_urls(args.fallbacks.iter().cloned())
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_headers(parse_headers(&args.headers));

    if let Some(dir) = &args.cache_dir {
        info!(path = %dir.display(), "Using on-disk conditional cache");
        builder = builder.with_disk_cache(dir.clone());
    }

    if args.no_proxy {
        // No proxy flag overrides everything else
        info!("All proxy settings disabled (--no-proxy flag)");
        builder = builder.with_system_proxy(false);
    } else if let Some(proxy_url) = &args.proxy {
        let mut proxy = ProxyConfig {
            proxy_type: args.proxy_type,
            ..ProxyConfig::new(proxy_url.clone())
        };

        // Configure proxy authentication if both username and password are provided
        if let (Some(username), Some(password)) = (&args.proxy_user, &args.proxy_pass) {
            proxy = proxy.with_auth(username.clone(), password.clone());
        }

        info!(
            proxy_url = %proxy_url,
            proxy_type = ?proxy.proxy_type,
            has_auth = proxy.auth.is_some(),
            "Using explicit proxy configuration"
        );
        builder = builder.with_proxy(proxy);
    }

    Ok(builder.build())
}
