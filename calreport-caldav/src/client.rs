//! Blocking CalDAV client.

use calreport_core::error::{CalReportError, CalReportResult};
use calreport_core::ics;
use calreport_core::remote::{CalendarHandle, CalendarTransport, RemoteRecord};
use calreport_core::window::ReportWindow;
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use url::Url;

use crate::report::{calendar_query_body, parse_calendar_resources};

const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// Username and password for HTTP basic auth.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// One calendar collection on a CalDAV server.
#[derive(Debug)]
pub struct CalDavClient {
    http: Client,
    /// Base for hrefs the server reports
    server: Url,
    calendar_url: Url,
    credentials: Credentials,
}

impl CalDavClient {
    /// `server` defaults to `calendar_url`; relative hrefs are resolved
    /// against it.
    pub fn new(
        server: Option<&str>,
        calendar_url: &str,
        credentials: Credentials,
    ) -> CalReportResult<Self> {
        let calendar_url = parse_url(calendar_url, "connection.calendar_url")?;
        let server = match server {
            Some(server) => parse_url(server, "connection.server")?,
            None => calendar_url.clone(),
        };

        let http = Client::builder()
            .user_agent(concat!("calreport/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CalReportError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(CalDavClient {
            http,
            server,
            calendar_url,
            credentials,
        })
    }

    pub fn calendar(&self) -> CalendarHandle {
        CalendarHandle::new(self.calendar_url.as_str())
    }

    fn resolve(&self, href: &str) -> CalReportResult<Url> {
        self.server
            .join(href)
            .map_err(|e| CalReportError::Transport(format!("Invalid href {}: {}", href, e)))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    fn send(&self, request: RequestBuilder, what: &str) -> CalReportResult<Response> {
        request
            .send()
            .map_err(|e| CalReportError::Transport(format!("{} failed: {}", what, e)))
    }
}

impl CalendarTransport for CalDavClient {
    fn query(&self, window: &ReportWindow) -> CalReportResult<Vec<RemoteRecord>> {
        let (start, end) = window.to_caldav_range();
        tracing::debug!(calendar = %self.calendar_url, %start, %end, "Querying calendar");

        let method = Method::from_bytes(b"REPORT")
            .map_err(|e| CalReportError::Transport(e.to_string()))?;
        let request = self
            .request(method, self.calendar_url.clone())
            .header("Depth", "1")
            .header("Content-Type", XML_CONTENT_TYPE)
            .body(calendar_query_body(&start, &end));

        let response = checked(self.send(request, "Calendar query")?, "Calendar query")?;
        let body = response
            .text()
            .map_err(|e| CalReportError::Transport(format!("Failed to read query response: {}", e)))?;

        parse_calendar_resources(&body)
    }

    fn load(&self, record: &mut RemoteRecord) -> CalReportResult<()> {
        if record.data.is_some() {
            return Ok(());
        }

        let url = self.resolve(&record.href)?;
        let response = checked(self.send(self.request(Method::GET, url), "Loading event")?, "Loading event")?;

        if record.etag.is_none() {
            record.etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
        }
        let data = response
            .text()
            .map_err(|e| CalReportError::Transport(format!("Failed to read event {}: {}", record.href, e)))?;
        record.data = Some(data);

        Ok(())
    }

    fn persist(&self, record: &RemoteRecord) -> CalReportResult<()> {
        let url = self.resolve(&record.href)?;
        let mut request = self
            .request(Method::PUT, url)
            .header("Content-Type", ICS_CONTENT_TYPE)
            .body(record.loaded_data()?.to_string());

        // Conditional update when the server gave us an etag
        if let Some(etag) = &record.etag {
            request = request.header("If-Match", etag);
        }

        checked(self.send(request, "Updating event")?, "Updating event")?;
        tracing::debug!(href = %record.href, "Updated event");
        Ok(())
    }

    fn delete(&self, record: &RemoteRecord) -> CalReportResult<()> {
        let url = self.resolve(&record.href)?;
        let response = self.send(self.request(Method::DELETE, url), "Deleting event")?;

        // Already gone is fine
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        checked(response, "Deleting event")?;
        Ok(())
    }

    fn recreate(&self, calendar: &CalendarHandle, data: &str) -> CalReportResult<()> {
        let uid = ics::record_uid(data)
            .ok_or_else(|| CalReportError::IcsParse("Record to recreate has no UID".to_string()))?;
        let url = self.resolve(&calendar.event_href(&uid))?;

        let request = self
            .request(Method::PUT, url)
            .header("Content-Type", ICS_CONTENT_TYPE)
            .header("If-None-Match", "*")
            .body(data.to_string());

        checked(self.send(request, "Recreating event")?, "Recreating event")?;
        tracing::debug!(%uid, "Recreated event");
        Ok(())
    }
}

fn parse_url(value: &str, key: &str) -> CalReportResult<Url> {
    Url::parse(value).map_err(|e| CalReportError::Config(format!("{} is not a valid URL ({}): {}", key, value, e)))
}

fn checked(response: Response, what: &str) -> CalReportResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(status_error(status.as_u16(), body, what))
}

fn status_error(status: u16, body: String, what: &str) -> CalReportError {
    match status {
        401 | 403 => CalReportError::Unauthorized(format!("{} was rejected with status {}", what, status)),
        404 => CalReportError::NotFound(format!("{} returned status 404", what)),
        _ => CalReportError::Http { status, body },
    }
}
