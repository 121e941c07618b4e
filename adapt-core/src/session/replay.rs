//! Newline-delimited JSON event recordings
//!
//! One [`GatewayEvent`] per line. Blank lines and lines starting with `#`
//! are skipped.

use std::io::BufRead;

use super::error::SessionError;
use super::events::GatewayEvent;

/// Parse a recording into events
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<GatewayEvent>, SessionError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| SessionError::InvalidEvent {
            line: index + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Serialize events as a recording
pub fn write_events<'a>(
    events: impl IntoIterator<Item = &'a GatewayEvent>,
) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapt_plugin_api::Tenant;

    #[test]
    fn test_read_skips_blank_and_comment_lines() {
        let input = "# recorded session\n{\"event\":\"ready\"}\n\n{\"event\":\"tenant_left\",\"data\":{\"id\":1,\"name\":\"a\"}}\n";
        let events = read_events(input.as_bytes()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], GatewayEvent::Ready);
        assert_eq!(events[1].name(), "tenant_left");
    }

    #[test]
    fn test_read_reports_line_number() {
        let input = "{\"event\":\"ready\"}\n{\"event\":\"nope\"}\n";
        let err = read_events(input.as_bytes()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidEvent { line: 2, .. }));
    }

    #[test]
    fn test_written_recording_reads_back() {
        let events = vec![
            GatewayEvent::Ready,
            GatewayEvent::TenantJoined(Tenant {
                id: 42,
                name: "Guild".into(),
            }),
        ];
        let recording = write_events(&events).unwrap();
        assert_eq!(recording.lines().count(), 2);
        assert_eq!(read_events(recording.as_bytes()).unwrap(), events);
    }
}
