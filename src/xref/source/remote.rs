use crate::error::{XrefError, XrefResult};
use crate::xref::record::{FieldMapping, RawRow};
use crate::xref::source::{SourceAdapter, SourceKind};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Sheet-to-JSON web service returning an array of row objects.
#[derive(Debug, Clone)]
pub struct RemoteSource {
    url: String,
    timeout: Duration,
    mapping: FieldMapping,
}

/// `{api_url}/{sheet_id}/{sheet_name}`, skipping blank segments.
pub fn sheet_endpoint(api_url: &str, sheet_id: &str, sheet_name: &str) -> String {
    let mut url = api_url.trim().trim_end_matches('/').to_string();
    for segment in [sheet_id, sheet_name] {
        let segment = segment.trim().trim_matches('/');
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    url
}

impl RemoteSource {
    pub fn new(url: impl Into<String>, timeout: Duration, mapping: FieldMapping) -> Self {
        Self {
            url: url.into(),
            timeout,
            mapping,
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> XrefError {
        XrefError::unavailable(SourceKind::Remote.as_str(), reason)
    }
}

pub(crate) fn rows_from_json_array(payload: Value) -> Option<Vec<RawRow>> {
    let Value::Array(items) = payload else {
        return None;
    };
    let rows = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(obj),
            _ => None,
        })
        .collect::<Vec<_>>();
    Some(rows)
}

impl SourceAdapter for RemoteSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    fn load(&self) -> XrefResult<Vec<RawRow>> {
        if self.url.trim().is_empty() {
            return Err(self.unavailable("no endpoint configured"));
        }
        tracing::info!(url = %self.url, "fetching remote cross-reference sheet");

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| self.unavailable(format!("http client: {err}")))?;
        let response = client
            .get(&self.url)
            .send()
            .map_err(|err| self.unavailable(format!("request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(self.unavailable(format!("status {}", response.status())));
        }
        let payload: Value = response
            .json()
            .map_err(|err| self.unavailable(format!("invalid json: {err}")))?;

        match rows_from_json_array(payload) {
            Some(rows) if !rows.is_empty() => Ok(rows),
            Some(_) => Err(self.unavailable("empty payload")),
            None => Err(self.unavailable("payload is not an array")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one canned HTTP response on a loopback port.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}/sheet-id/Sheet1")
    }

    fn source(url: String) -> RemoteSource {
        RemoteSource::new(url, Duration::from_secs(5), FieldMapping::orj_no())
    }

    #[test]
    fn endpoint_joins_segments() {
        assert_eq!(
            sheet_endpoint("https://api.example.com/v1/", "abc", "Sheet1"),
            "https://api.example.com/v1/abc/Sheet1"
        );
        assert_eq!(sheet_endpoint("http://h/x", "", ""), "http://h/x");
    }

    #[test]
    fn loads_object_rows() {
        let url = serve_once(
            "200 OK",
            r#"[{"orjNo":"A-1","yvNo":"V1"},{"orjNo":"B 2","yvNo":"V2"},7]"#,
        );
        let rows = source(url).load().expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("orjNo"), Some(&Value::String("B 2".into())));
    }

    #[test]
    fn non_success_status_is_unavailable() {
        let url = serve_once("503 Service Unavailable", "[]");
        let err = source(url).load().expect_err("503");
        let XrefError::SourceUnavailable { reason, .. } = err else {
            panic!("unexpected error kind");
        };
        assert!(reason.contains("503"), "{reason}");
    }

    #[test]
    fn empty_or_non_array_payload_is_unavailable() {
        let empty = source(serve_once("200 OK", "[]")).load().expect_err("empty");
        assert!(empty.to_string().contains("empty payload"));
        let object = source(serve_once("200 OK", r#"{"rows":[]}"#))
            .load()
            .expect_err("object");
        assert!(object.to_string().contains("not an array"));
    }

    #[test]
    fn unreachable_endpoint_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let err = source(format!("http://{addr}/x")).load().expect_err("refused");
        assert!(matches!(err, XrefError::SourceUnavailable { .. }));
    }
}
