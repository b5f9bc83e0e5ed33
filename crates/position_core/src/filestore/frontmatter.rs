//! `---`-delimited YAML header blocks for markdown record files.

use serde::de::DeserializeOwned;
use serde::Serialize;

const DELIMITER: &str = "---";

/// Renders `header` as a YAML block followed by `body`.
pub fn render<T: Serialize>(header: &T, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(header)?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

/// Splits a document into `(yaml_header, body)`.
///
/// Returns `None` when the document does not start with a header block or
/// the block is never closed.
pub fn split(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parses the header block of `content` into `T`.
pub fn parse<T: DeserializeOwned>(content: &str) -> Result<(T, &str), String> {
    let (yaml, body) = split(content).ok_or_else(|| "missing header block".to_string())?;
    let header = serde_yaml::from_str(yaml).map_err(|err| err.to_string())?;
    Ok((header, body))
}

#[cfg(test)]
mod tests {
    use super::{parse, render, split};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Header {
        id: String,
        latitude: f64,
    }

    #[test]
    fn render_then_parse_keeps_header_and_body() {
        let header = Header {
            id: "abc".to_string(),
            latitude: 41.8781,
        };
        let doc = render(&header, "\nchicago\n").unwrap();
        assert!(doc.starts_with("---\nid: abc\n"));

        let (parsed, body): (Header, &str) = parse(&doc).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(body, "\nchicago\n");
    }

    #[test]
    fn split_rejects_documents_without_closed_header() {
        assert!(split("no header here").is_none());
        assert!(split("---\nid: abc\n").is_none());
    }

    #[test]
    fn split_handles_empty_body() {
        let (yaml, body) = split("---\nid: abc\n---\n").unwrap();
        assert_eq!(yaml, "id: abc\n");
        assert_eq!(body, "");
    }
}
