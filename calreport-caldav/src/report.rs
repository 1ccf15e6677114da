//! calendar-query REPORT: request body and multistatus parsing.

use calreport_core::error::{CalReportError, CalReportResult};
use calreport_core::remote::RemoteRecord;

/// Request body for VEVENTs overlapping `[start, end]`.
///
/// `start` and `end` must be in CalDAV format: `YYYYMMDDTHHMMSSZ`
pub fn calendar_query_body(start: &str, end: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
        start, end
    )
}

/// Parse calendar resources from a multistatus response.
///
/// Resources that came without calendar-data are kept with `data: None`
/// so they can be loaded one by one; the collection itself is skipped.
pub fn parse_calendar_resources(body: &str) -> CalReportResult<Vec<RemoteRecord>> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| CalReportError::Transport(format!("Invalid multistatus response: {}", e)))?;
    let root = doc.root_element();

    let mut records = Vec::new();

    for response in root.descendants().filter(|n| n.tag_name().name() == "response") {
        let text_of = |name: &str| {
            response
                .descendants()
                .find(|n| n.tag_name().name() == name)
                .and_then(|n| n.text())
                .map(|s| s.to_string())
        };

        let Some(href) = text_of("href").map(|h| h.trim().to_string()) else {
            continue;
        };
        let etag = text_of("getetag");

        match text_of("calendar-data") {
            Some(data) => records.push(RemoteRecord::with_data(href, etag, data)),
            None if href.ends_with('/') => continue,
            None => records.push(RemoteRecord { etag, ..RemoteRecord::new(href) }),
        }
    }

    Ok(records)
}
