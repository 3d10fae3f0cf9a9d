//! Configuration for the upstream connection and the accumulator.
//!
//! [`UpstreamConfig`] holds what is needed to reach an OpenAI-compatible chat
//! API. [`AccumulatorConfig`] holds the request shaping applied to every run:
//! the instructional preamble, the heading used when caller context is
//! attached, and the plan tool's name.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use crate::errors::{PlanStreamError, PlanStreamResult};

/// Default base URL for the upstream API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default connection timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default name of the plan tool.
pub const DEFAULT_TOOL_NAME: &str = "manage_plan";

/// Default heading placed before caller-supplied context.
pub const DEFAULT_CONTEXT_HEADING: &str = "Current plan context:";

/// Placeholder in the preamble replaced by the configured tool name.
pub const TOOL_NAME_PLACEHOLDER: &str = "{tool}";

/// Default instructional preamble sent as the system message.
pub const DEFAULT_PREAMBLE: &str = "\
You are a planning assistant that helps people turn goals into structured, actionable plans.

The person sees the conversation next to a live plan document. You have a tool called \
`{tool}`. Use it whenever you are asked to create, change or refine the plan; the \
document updates as soon as you call it. Always say in the conversation what you changed.

Rules:
1. If no goal has been given yet, ask for one.
2. Break goals down into concrete steps, each with a short title and a status.
3. Use the `{tool}` tool to show the plan.";

/// Configuration for the upstream model API.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// API key for authentication (stored securely).
    pub(crate) api_key: SecretString,
    /// Base URL for API requests.
    pub base_url: String,
    /// Model requested for every completion.
    pub model: String,
    /// Connection timeout. A streaming body is never cut off by it.
    pub timeout: Duration,
    /// Custom headers to include in requests.
    pub custom_headers: Vec<(String, String)>,
}

impl UpstreamConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> UpstreamConfigBuilder {
        UpstreamConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENAI_API_KEY` (required): API key for authentication
    /// - `OPENAI_BASE_URL` (optional): Custom base URL
    /// - `OPENAI_MODEL` (optional): Model name
    /// - `OPENAI_TIMEOUT` (optional): Connection timeout in seconds
    pub fn from_env() -> PlanStreamResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PlanStreamError::Configuration {
                message: "OPENAI_API_KEY environment variable not set".to_string(),
            }
        })?;

        let mut builder = UpstreamConfigBuilder::new().api_key(api_key);

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            builder = builder.model(model);
        }

        if let Ok(timeout_str) = std::env::var("OPENAI_TIMEOUT") {
            match timeout_str.parse::<u64>() {
                Ok(timeout_secs) => builder = builder.timeout(Duration::from_secs(timeout_secs)),
                Err(_) => tracing::warn!(value = %timeout_str, "Ignoring non-numeric OPENAI_TIMEOUT"),
            }
        }

        builder.build()
    }

    /// Returns the API key (exposing the secret).
    pub(crate) fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Returns the API key hint (last 4 characters) for debugging.
    pub fn api_key_hint(&self) -> String {
        let key = self.api_key.expose_secret();
        if key.len() > 4 {
            format!("...{}", &key[key.len() - 4..])
        } else {
            "****".to_string()
        }
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder for `UpstreamConfig`.
#[derive(Default)]
pub struct UpstreamConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
    custom_headers: Vec<(String, String)>,
}

impl UpstreamConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a custom header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> PlanStreamResult<UpstreamConfig> {
        let api_key = self.api_key.ok_or_else(|| PlanStreamError::Configuration {
            message: "API key is required".to_string(),
        })?;

        if api_key.is_empty() {
            return Err(PlanStreamError::Configuration {
                message: "API key cannot be empty".to_string(),
            });
        }

        // The key goes into a header value verbatim
        if api_key.chars().any(char::is_whitespace) {
            return Err(PlanStreamError::Configuration {
                message: "API key must not contain whitespace".to_string(),
            });
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        validate_base_url(&base_url)?;

        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.is_empty() {
            return Err(PlanStreamError::Configuration {
                message: "Model cannot be empty".to_string(),
            });
        }

        Ok(UpstreamConfig {
            api_key: SecretString::new(api_key),
            base_url,
            model,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            custom_headers: self.custom_headers,
        })
    }
}

/// HTTPS is required except for loopback hosts.
fn validate_base_url(base_url: &str) -> PlanStreamResult<()> {
    let url = Url::parse(base_url)?;

    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(&url) => Ok(()),
        _ => Err(PlanStreamError::Configuration {
            message: "Base URL must use HTTPS".to_string(),
        }),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
        Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

/// Request shaping applied by the accumulator on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatorConfig {
    /// System message placed before the history. Every `{tool}` in it is
    /// replaced with [`AccumulatorConfig::tool_name`].
    pub preamble: String,
    /// Line placed between the preamble and caller context.
    pub context_heading: String,
    /// Name of the plan tool, reported on the finalized tool call.
    pub tool_name: String,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            preamble: DEFAULT_PREAMBLE.to_string(),
            context_heading: DEFAULT_CONTEXT_HEADING.to_string(),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
        }
    }
}

impl AccumulatorConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preamble.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Sets the context heading.
    #[must_use]
    pub fn with_context_heading(mut self, heading: impl Into<String>) -> Self {
        self.context_heading = heading.into();
        self
    }

    /// Sets the tool name.
    #[must_use]
    pub fn with_tool_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }

    /// The system message for a run, with context appended when present.
    ///
    /// Blank context is treated as absent.
    pub fn system_prompt(&self, context: Option<&str>) -> String {
        let preamble = self.preamble.replace(TOOL_NAME_PLACEHOLDER, &self.tool_name);
        match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => format!("{preamble}\n\n{}\n{context}", self.context_heading),
            None => preamble,
        }
    }
}
