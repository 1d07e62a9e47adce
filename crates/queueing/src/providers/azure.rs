//! Azure Storage Queue provider implementation using the HTTP REST API.
//!
//! This module talks to the Storage Queue service directly over HTTP instead of
//! going through an SDK, so every request and response can be mocked in tests.
//!
//! ## Authentication
//!
//! Connection strings select one of two credential kinds:
//! - **Shared Key**: `AccountName=...;AccountKey=...`; every request is signed
//!   with HMAC-SHA256 over the canonicalized request
//! - **Shared Access Signature**: `SharedAccessSignature=...`; the token is
//!   appended to every request URL
//!
//! `UseDevelopmentStorage=true` targets the local storage emulator with its
//! well-known account.
//!
//! ## Lease mapping
//!
//! | Operation              | Request                                              |
//! |------------------------|------------------------------------------------------|
//! | enqueue                | `POST {queue}/messages?visibilitytimeout&messagettl` |
//! | receive                | `GET {queue}/messages?numofmessages=1&visibilitytimeout` |
//! | delete_leased_message  | `DELETE {queue}/messages/{id}?popreceipt`            |
//! | release_lease_early    | `PUT {queue}/messages/{id}?popreceipt&visibilitytimeout=0` |
//!
//! The pop receipt returned by a receive is the lease token. A successful
//! early release issues a new pop receipt, which is not adopted, so the
//! released lease stays resolved.
//!
//! ## Example
//!
//! ```no_run
//! use queueing::{AzureStorageQueueProvider, QueueingProvider};
//! use chrono::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = AzureStorageQueueProvider::from_connection_string(
//!     "UseDevelopmentStorage=true",
//!     "orders",
//!     Duration::seconds(30),
//!     Duration::days(1),
//! )?;
//!
//! let client = provider.create_client();
//! client.send_text("hello", &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{QueueingClient, QueueingProvider, StoreQueueingClient};
use crate::error::QueueError;
use crate::message::{LeaseToken, LeasedMessage, MessageId, QueueName, Timestamp};
use crate::provider::{
    AzureServiceVersion, AzureStorageQueueConfig, LeasePolicy, MessageEncoding, ProviderType,
};
use crate::store::{QueueStore, StoreError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[cfg(test)]
#[path = "azure_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// Account name of the local storage emulator
pub const DEVELOPMENT_STORAGE_ACCOUNT: &str = "devstoreaccount1";

/// Publicly documented key of the local storage emulator
pub const DEVELOPMENT_STORAGE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Queue endpoint of the local storage emulator
pub const DEVELOPMENT_STORAGE_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

const XML_CONTENT_TYPE: &str = "application/xml";

// ============================================================================
// Storage Account
// ============================================================================

/// Credentials used to authorize requests
#[derive(Clone)]
enum Credentials {
    SharedKey { key: Vec<u8> },
    SharedAccessSignature { token: String },
}

/// Storage account resolved from a connection string
#[derive(Clone)]
pub struct StorageAccount {
    account_name: String,
    queue_endpoint: Url,
    credentials: Credentials,
}

impl StorageAccount {
    /// Parse a storage connection string
    ///
    /// Recognised keys: `UseDevelopmentStorage`, `AccountName`, `AccountKey`,
    /// `SharedAccessSignature`, `DefaultEndpointsProtocol`, `EndpointSuffix`,
    /// `QueueEndpoint`. Unknown keys are ignored.
    pub fn parse(connection_string: &str) -> Result<Self, QueueError> {
        let settings = parse_connection_settings(connection_string)?;

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development_storage();
        }

        let account_name = settings.get("accountname").cloned();

        let queue_endpoint = match settings.get("queueendpoint") {
            Some(endpoint) => parse_endpoint(endpoint)?,
            None => {
                let account = account_name.as_deref().ok_or_else(|| {
                    QueueError::invalid_argument(
                        "connection_string",
                        "AccountName or QueueEndpoint is required",
                    )
                })?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                parse_endpoint(&format!("{}://{}.queue.{}", protocol, account, suffix))?
            }
        };

        let credentials = if let Some(key) = settings.get("accountkey") {
            let key = STANDARD.decode(key).map_err(|e| {
                QueueError::invalid_argument(
                    "connection_string",
                    format!("AccountKey is not valid base64: {}", e),
                )
            })?;
            Credentials::SharedKey { key }
        } else if let Some(token) = settings.get("sharedaccesssignature") {
            Credentials::SharedAccessSignature {
                token: token.trim_start_matches('?').to_string(),
            }
        } else {
            return Err(QueueError::invalid_argument(
                "connection_string",
                "AccountKey or SharedAccessSignature is required",
            ));
        };

        let account_name = match (account_name, &credentials) {
            (Some(name), _) => name,
            (None, Credentials::SharedAccessSignature { .. }) => String::new(),
            (None, Credentials::SharedKey { .. }) => {
                return Err(QueueError::invalid_argument(
                    "connection_string",
                    "AccountName is required with AccountKey",
                ))
            }
        };

        Ok(Self {
            account_name,
            queue_endpoint,
            credentials,
        })
    }

    fn development_storage() -> Result<Self, QueueError> {
        let key = STANDARD.decode(DEVELOPMENT_STORAGE_KEY).map_err(|e| {
            QueueError::invalid_argument("connection_string", format!("invalid key: {}", e))
        })?;

        Ok(Self {
            account_name: DEVELOPMENT_STORAGE_ACCOUNT.to_string(),
            queue_endpoint: parse_endpoint(DEVELOPMENT_STORAGE_QUEUE_ENDPOINT)?,
            credentials: Credentials::SharedKey { key },
        })
    }

    /// Storage account name
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Base URL of the queue service
    pub fn queue_endpoint(&self) -> &Url {
        &self.queue_endpoint
    }

    /// Check if requests are signed with the account key
    pub fn uses_shared_key(&self) -> bool {
        matches!(self.credentials, Credentials::SharedKey { .. })
    }
}

impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let credentials = match self.credentials {
            Credentials::SharedKey { .. } => "SharedKey(<redacted>)",
            Credentials::SharedAccessSignature { .. } => "SharedAccessSignature(<redacted>)",
        };

        f.debug_struct("StorageAccount")
            .field("account_name", &self.account_name)
            .field("queue_endpoint", &self.queue_endpoint.as_str())
            .field("credentials", &credentials)
            .finish()
    }
}

fn parse_connection_settings(connection_string: &str) -> Result<HashMap<String, String>, QueueError> {
    let mut settings = HashMap::new();

    let segments = connection_string
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for (index, part) in segments.enumerate() {
        // Segments are never echoed back since they may hold secrets
        let (key, value) = part.split_once('=').ok_or_else(|| {
            QueueError::invalid_argument(
                "connection_string",
                format!("segment {} is not a key=value pair", index + 1),
            )
        })?;
        settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    if settings.is_empty() {
        return Err(QueueError::invalid_argument(
            "connection_string",
            "must not be empty",
        ));
    }

    Ok(settings)
}

fn parse_endpoint(endpoint: &str) -> Result<Url, QueueError> {
    let url = Url::parse(endpoint).map_err(|e| {
        QueueError::invalid_argument(
            "connection_string",
            format!("invalid queue endpoint '{}': {}", endpoint, e),
        )
    })?;

    if url.cannot_be_a_base() {
        return Err(QueueError::invalid_argument(
            "connection_string",
            format!("queue endpoint '{}' is not a base URL", endpoint),
        ));
    }

    Ok(url)
}

// ============================================================================
// Shared Key Signing
// ============================================================================

/// Canonicalized resource for Shared Key authorization
///
/// `/{account}{path}` followed by one `\n{name}:{values}` line per query
/// parameter, names lowercased and sorted, repeated values comma-joined.
fn canonicalized_resource(account_name: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account_name, url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    for (name, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }

    resource
}

/// String to sign for Shared Key authorization
///
/// `ms_headers` must contain every `x-ms-*` header sent with the request.
fn string_to_sign(
    method: &Method,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, String)],
    canonical_resource: &str,
) -> String {
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range
    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        method.as_str(),
        content_length,
        content_type,
        canonical_headers,
        canonical_resource
    )
}

/// Base64 HMAC-SHA256 of the string to sign
fn sign(key: &[u8], string_to_sign: &str) -> Result<String, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::Encoding(format!("invalid signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// RFC 1123 date as required by `x-ms-date`
fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ============================================================================
// Azure Queue Store
// ============================================================================

/// Store handle onto one Azure storage queue
pub struct AzureQueueStore {
    http_client: reqwest::Client,
    account: Arc<StorageAccount>,
    queue_name: QueueName,
    service_version: AzureServiceVersion,
    message_encoding: MessageEncoding,
}

impl AzureQueueStore {
    /// URL of the queue's message collection, or of one message in it
    fn messages_url(&self, message_id: Option<&MessageId>) -> Result<Url, StoreError> {
        let mut url = self.account.queue_endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::Transport("queue endpoint cannot be a base URL".to_string())
            })?;
            segments
                .pop_if_empty()
                .push(self.queue_name.as_str())
                .push("messages");
            if let Some(message_id) = message_id {
                segments.push(message_id.as_str());
            }
        }
        url.set_query(None);
        Ok(url)
    }

    /// Encode a payload for the `MessageText` element
    fn encode_body(&self, body: &Bytes) -> Result<String, StoreError> {
        let text = match self.message_encoding {
            MessageEncoding::Base64 => STANDARD.encode(body),
            MessageEncoding::Text => std::str::from_utf8(body)
                .map_err(|e| {
                    StoreError::Encoding(format!(
                        "text encoding requires a UTF-8 payload: {}",
                        e
                    ))
                })?
                .to_string(),
        };

        Ok(text)
    }

    /// Decode the `MessageText` element into a payload
    fn decode_body(&self, text: &str) -> Result<Bytes, StoreError> {
        match self.message_encoding {
            MessageEncoding::Base64 => STANDARD
                .decode(text.trim())
                .map(Bytes::from)
                .map_err(|e| StoreError::Encoding(format!("Base64 decode failed: {}", e))),
            MessageEncoding::Text => Ok(Bytes::copy_from_slice(text.as_bytes())),
        }
    }

    /// Sign and send one request, returning the response body on success
    async fn make_request(
        &self,
        method: Method,
        mut url: Url,
        body: Option<String>,
    ) -> Result<String, StoreError> {
        let ms_headers = [
            ("x-ms-date", rfc1123_now()),
            ("x-ms-version", self.service_version.as_str().to_string()),
        ];

        let body = body.unwrap_or_default();
        let content_type = if body.is_empty() { "" } else { XML_CONTENT_TYPE };

        let authorization = match self.account.credentials {
            Credentials::SharedKey { ref key } => {
                let resource = canonicalized_resource(&self.account.account_name, &url);
                let to_sign =
                    string_to_sign(&method, body.len(), content_type, &ms_headers, &resource);
                Some(format!(
                    "SharedKey {}:{}",
                    self.account.account_name,
                    sign(key, &to_sign)?
                ))
            }
            Credentials::SharedAccessSignature { ref token } => {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{}&{}", existing, token),
                    _ => token.clone(),
                };
                url.set_query(Some(&query));
                None
            }
        };

        let mut request = self.http_client.request(method.clone(), url);
        for (name, value) in ms_headers {
            request = request.header(name, value);
        }
        if let Some(authorization) = authorization {
            request = request.header("Authorization", authorization);
        }
        if !content_type.is_empty() {
            request = request.header("Content-Type", content_type);
        }
        request = request.body(body);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Transport(format!("Request timeout: {}", e))
            } else if e.is_connect() {
                StoreError::Transport(format!("Connection failed: {}", e))
            } else {
                StoreError::Transport(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let response_body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let error = parse_error_response(status, &headers, &response_body);
            debug!(%method, status = status.as_u16(), error = %error, "Storage request failed");
            return Err(error);
        }

        Ok(response_body)
    }
}

impl fmt::Debug for AzureQueueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureQueueStore")
            .field("account", &self.account)
            .field("queue_name", &self.queue_name)
            .field("service_version", &self.service_version)
            .field("message_encoding", &self.message_encoding)
            .finish()
    }
}

/// Whole seconds as sent in query parameters, rounding any fraction up
fn to_seconds(duration: Duration) -> i64 {
    let seconds = duration.num_seconds();
    if duration > Duration::seconds(seconds) {
        seconds + 1
    } else {
        seconds
    }
}

/// `messagettl` query value; zero or negative means "never expires"
fn message_ttl_seconds(time_to_live: Duration) -> i64 {
    if time_to_live <= Duration::zero() {
        -1
    } else {
        to_seconds(time_to_live)
    }
}

#[async_trait]
impl QueueStore for AzureQueueStore {
    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    #[instrument(skip(self, body), fields(queue = %self.queue_name, size = body.len()))]
    async fn enqueue(
        &self,
        body: Bytes,
        initial_delay: Duration,
        time_to_live: Duration,
    ) -> Result<(), StoreError> {
        let text = self.encode_body(&body)?;
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            quick_xml::escape::escape(text.as_str())
        );

        let mut url = self.messages_url(None)?;
        url.query_pairs_mut()
            .append_pair("visibilitytimeout", &to_seconds(initial_delay).to_string())
            .append_pair("messagettl", &message_ttl_seconds(time_to_live).to_string());

        self.make_request(Method::POST, url, Some(xml)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(queue = %self.queue_name))]
    async fn receive(
        &self,
        visibility_timeout: Duration,
    ) -> Result<Option<LeasedMessage>, StoreError> {
        let mut url = self.messages_url(None)?;
        url.query_pairs_mut()
            .append_pair("numofmessages", "1")
            .append_pair("visibilitytimeout", &to_seconds(visibility_timeout).to_string());

        let xml = self.make_request(Method::GET, url, None).await?;
        let mut messages = parse_messages_list(&xml)?;

        if messages.len() > 1 {
            warn!(count = messages.len(), "Store returned more messages than requested");
        }

        if messages.is_empty() {
            return Ok(None);
        }

        let raw = messages.swap_remove(0);
        let body = self.decode_body(&raw.message_text)?;
        Ok(Some(raw.into_leased(body)))
    }

    #[instrument(skip(self, lease_token), fields(queue = %self.queue_name))]
    async fn delete_leased_message(
        &self,
        message_id: &MessageId,
        lease_token: &LeaseToken,
    ) -> Result<(), StoreError> {
        let mut url = self.messages_url(Some(message_id))?;
        url.query_pairs_mut()
            .append_pair("popreceipt", lease_token.as_str());

        self.make_request(Method::DELETE, url, None).await?;
        Ok(())
    }

    #[instrument(skip(self, lease_token), fields(queue = %self.queue_name))]
    async fn release_lease_early(
        &self,
        message_id: &MessageId,
        lease_token: &LeaseToken,
    ) -> Result<(), StoreError> {
        let mut url = self.messages_url(Some(message_id))?;
        url.query_pairs_mut()
            .append_pair("popreceipt", lease_token.as_str())
            .append_pair("visibilitytimeout", "0");

        // The response carries a new pop receipt, which is not adopted
        self.make_request(Method::PUT, url, None).await?;
        Ok(())
    }
}

// ============================================================================
// XML Parsing
// ============================================================================

/// One `QueueMessage` element of a `QueueMessagesList`
#[derive(Debug, Default)]
struct RawQueueMessage {
    message_id: Option<String>,
    pop_receipt: Option<String>,
    insertion_time: Option<String>,
    expiration_time: Option<String>,
    time_next_visible: Option<String>,
    dequeue_count: Option<String>,
    message_text: String,
}

impl RawQueueMessage {
    fn into_leased(self, body: Bytes) -> LeasedMessage {
        LeasedMessage {
            message_id: self
                .message_id
                .as_deref()
                .and_then(|id| MessageId::from_str(id).ok())
                .unwrap_or_default(),
            lease_token: self
                .pop_receipt
                .as_deref()
                .and_then(|r| LeaseToken::from_str(r).ok())
                .unwrap_or_else(LeaseToken::generate),
            body,
            dequeue_count: self
                .dequeue_count
                .as_deref()
                .and_then(|c| c.trim().parse().ok())
                .unwrap_or(1),
            inserted_at: self
                .insertion_time
                .as_deref()
                .and_then(Timestamp::parse_rfc1123),
            expires_at: self
                .expiration_time
                .as_deref()
                .and_then(Timestamp::parse_rfc1123),
            next_visible_at: self
                .time_next_visible
                .as_deref()
                .and_then(Timestamp::parse_rfc1123),
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.message_id.as_deref().map_or(true, str::is_empty) {
            return Err(StoreError::Encoding(
                "QueueMessage is missing MessageId".to_string(),
            ));
        }
        if self.pop_receipt.as_deref().map_or(true, str::is_empty) {
            return Err(StoreError::Encoding(
                "QueueMessage is missing PopReceipt".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse the body of a Get Messages response
fn parse_messages_list(xml: &str) -> Result<Vec<RawQueueMessage>, StoreError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    // Whitespace is significant inside MessageText for text-encoded queues
    reader.trim_text(false);

    let mut messages = Vec::new();
    let mut current: Option<RawQueueMessage> = None;
    let mut element: Option<Vec<u8>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"QueueMessage" => current = Some(RawQueueMessage::default()),
                name => element = Some(name.to_vec()),
            },
            Ok(Event::Text(e)) => {
                if let (Some(message), Some(name)) = (current.as_mut(), element.as_deref()) {
                    let text = e.unescape().map_err(|e| {
                        StoreError::Encoding(format!("Failed to parse XML: {}", e))
                    })?;
                    let field = match name {
                        b"MessageId" => Some(&mut message.message_id),
                        b"PopReceipt" => Some(&mut message.pop_receipt),
                        b"InsertionTime" => Some(&mut message.insertion_time),
                        b"ExpirationTime" => Some(&mut message.expiration_time),
                        b"TimeNextVisible" => Some(&mut message.time_next_visible),
                        b"DequeueCount" => Some(&mut message.dequeue_count),
                        b"MessageText" => {
                            message.message_text.push_str(&text);
                            None
                        }
                        _ => None,
                    };
                    if let Some(field) = field {
                        field.get_or_insert_with(String::new).push_str(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"QueueMessage" {
                    if let Some(message) = current.take() {
                        message.validate()?;
                        messages.push(message);
                    }
                }
                element = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(StoreError::Encoding(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

/// Build a status error from a failed response
///
/// The error code comes from the `x-ms-error-code` header when present,
/// otherwise from the `<Error><Code>` element of the body.
fn parse_error_response(status: StatusCode, headers: &HeaderMap, xml: &str) -> StoreError {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut error_code = None;
    let mut error_message = None;
    let mut in_code = false;
    let mut in_message = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"Code" => in_code = true,
                b"Message" => in_message = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_code {
                    error_code = e.unescape().ok().map(|s| s.into_owned());
                    in_code = false;
                } else if in_message {
                    error_message = e.unescape().ok().map(|s| s.into_owned());
                    in_message = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let code = headers
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(error_code)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', "")
        });
    let message = error_message
        .map(|m| m.lines().next().unwrap_or_default().to_string())
        .unwrap_or_else(|| "Unknown error".to_string());

    StoreError::status(status.as_u16(), code, message)
}

// ============================================================================
// Azure Storage Queue Provider
// ============================================================================

/// Azure Storage Queue provider
///
/// Clients created by one provider share a single HTTP connection pool.
pub struct AzureStorageQueueProvider {
    http_client: reqwest::Client,
    account: Arc<StorageAccount>,
    queue_name: QueueName,
    policy: LeasePolicy,
    service_version: AzureServiceVersion,
    message_encoding: MessageEncoding,
}

impl AzureStorageQueueProvider {
    /// Create new provider from configuration
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidArgument`] for an empty or malformed
    /// connection string, an invalid queue name, or a negative duration.
    pub fn new(config: AzureStorageQueueConfig) -> Result<Self, QueueError> {
        if config.connection_string.trim().is_empty() {
            return Err(QueueError::invalid_argument(
                "connection_string",
                "must not be empty",
            ));
        }

        let queue_name = QueueName::new(config.queue_name)?;
        let policy = LeasePolicy::new(
            config.policy.visibility_timeout,
            config.policy.time_to_live,
        )?;
        let account = StorageAccount::parse(&config.connection_string)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| QueueError::Transport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let service_version = config.service_version.unwrap_or_default();

        info!(
            account = %account.account_name,
            queue = %queue_name,
            service_version = service_version.as_str(),
            "Created Azure Storage Queue provider"
        );

        Ok(Self {
            http_client,
            account: Arc::new(account),
            queue_name,
            policy,
            service_version,
            message_encoding: config.message_encoding,
        })
    }

    /// Create provider from a connection string with default settings
    pub fn from_connection_string(
        connection_string: &str,
        queue_name: &str,
        visibility_timeout: Duration,
        time_to_live: Duration,
    ) -> Result<Self, QueueError> {
        let policy = LeasePolicy::new(visibility_timeout, time_to_live)?;
        Self::new(AzureStorageQueueConfig::new(
            connection_string,
            queue_name,
            policy,
        ))
    }

    /// Storage account the provider targets
    pub fn account(&self) -> &StorageAccount {
        &self.account
    }

    /// Create a store handle onto the configured queue
    pub fn create_store(&self) -> AzureQueueStore {
        AzureQueueStore {
            http_client: self.http_client.clone(),
            account: Arc::clone(&self.account),
            queue_name: self.queue_name.clone(),
            service_version: self.service_version,
            message_encoding: self.message_encoding,
        }
    }
}

impl fmt::Debug for AzureStorageQueueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureStorageQueueProvider")
            .field("account", &self.account)
            .field("queue_name", &self.queue_name)
            .field("policy", &self.policy)
            .field("service_version", &self.service_version)
            .field("message_encoding", &self.message_encoding)
            .finish()
    }
}

impl QueueingProvider for AzureStorageQueueProvider {
    fn create_client(&self) -> Box<dyn QueueingClient> {
        Box::new(StoreQueueingClient::new(self.create_store(), self.policy))
    }

    fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    fn policy(&self) -> LeasePolicy {
        self.policy
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AzureStorage
    }
}
