use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

pub const APP_USER_AGENT: &str = "InterfaceOficial/0.1.0";

/// Shared client for registry, loader metadata and artifact downloads.
///
/// Only the connect phase is bounded; a slow transfer is left to the
/// transport defaults.
pub fn build_http_client(connect_timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let mut builder = Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers);

    if let Some(timeout) = connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder.build()
}
