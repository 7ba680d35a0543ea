//! Shared utilities: the HTTP client, retry and tool-name helpers.

mod http;
mod names;
mod retry;

pub use http::{HttpClient, RateLimitedRequestBuilder};
pub use names::{fnv1a_32, sanitize_name, shorten_rpc_tool_name, unique_strings};
pub use retry::{is_transient, with_retry, RetryConfig};
