//! Streaming scan of backend XML replies
//!
//! Listing and PROPFIND replies are only ever read for a handful of text
//! nodes, so instead of deserializing whole documents the adapters walk the
//! event stream and receive each text node with its element path. Namespace
//! prefixes are dropped, so `<d:getcontentlength>` and `<D:getcontentlength>`
//! both appear as `getcontentlength`.

use quick_xml::events::Event;
use quick_xml::Reader;

/// Call `visit(path, text)` for every non-empty text node
///
/// `path` holds the local names of the enclosing elements, outermost first.
pub fn scan<F>(body: &str, mut visit: F) -> Result<(), String>
where
    F: FnMut(&[String], &str),
{
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if !text.is_empty() {
                    visit(&path, &text);
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if !text.is_empty() {
                    visit(&path, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ))
            }
            _ => {}
        }
    }

    Ok(())
}

/// Whether `path` ends with the given element names
pub fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_strips_namespace_prefixes() {
        let body = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response><d:propstat><d:prop>
    <d:getcontentlength>42</d:getcontentlength>
    <d:displayname/>
  </d:prop></d:propstat></d:response>
</d:multistatus>"#;

        let mut seen = Vec::new();
        scan(body, |path, text| seen.push((path.join("/"), text.to_string()))).unwrap();

        assert_eq!(
            seen,
            vec![(
                "multistatus/response/propstat/prop/getcontentlength".to_string(),
                "42".to_string()
            )]
        );
    }

    #[test]
    fn test_scan_empty_body() {
        let mut count = 0;
        scan("", |_, _| count += 1).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_scan_reports_malformed_documents() {
        assert!(scan("<a><b></a>", |_, _| {}).is_err());
    }

    #[test]
    fn test_ends_with() {
        let path: Vec<String> = ["ListBucketResult", "Contents", "Size"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(ends_with(&path, &["Contents", "Size"]));
        assert!(!ends_with(&path, &["Blob", "Size"]));
        assert!(!ends_with(&path[..1], &["Contents", "Size"]));
    }
}
