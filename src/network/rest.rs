use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use tonic::codegen::http::StatusCode;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RestVerb {
    Get,
    Post,
    Delete,
}

/// RestRequest is a REST call addressed to a single server. `path` has no leading '/'.
#[derive(Clone, PartialEq)]
pub struct RestRequest {
    pub verb: RestVerb,
    pub path: String,
    pub parameters: BTreeMap<String, String>,
    pub body: Bytes,
}

impl RestRequest {
    pub fn new<P: Into<String>>(verb: RestVerb, path: P) -> Self {
        RestRequest {
            verb,
            path: path.into(),
            parameters: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_parameter<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

impl fmt::Debug for RestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} /{} {:?} ({} bytes)",
            self.verb,
            self.path,
            self.parameters,
            self.body.len()
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RestResponse {
    pub fn new(status: StatusCode, body: Bytes) -> Self {
        RestResponse { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// encode_path_segment escapes `segment` so it can be embedded in a path as a single segment.
pub fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// decode_path_segment reverses `encode_path_segment`. `None` if the segment holds a `%` that
/// doesn't start an escape of two hex digits, or if it doesn't decode to UTF-8.
pub fn decode_path_segment(segment: &str) -> Option<String> {
    let well_formed = segment
        .split('%')
        .skip(1)
        .all(|escaped| escaped.len() >= 2 && escaped.as_bytes()[..2].iter().all(u8::is_ascii_hexdigit));
    if !well_formed {
        return None;
    }

    urlencoding::decode(segment).ok().map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segment_escaping() {
        let cases = vec![
            ("plain", "plain"),
            ("a/b", "a%2Fb"),
            ("100%", "100%25"),
            ("with space", "with%20space"),
            ("ключ", "%D0%BA%D0%BB%D1%8E%D1%87"),
        ];
        for (raw, encoded) in cases {
            assert_eq!(encoded, encode_path_segment(raw));
            assert_eq!(Some(raw.to_string()), decode_path_segment(encoded));
        }

        let reserved = "a/b %c?d#e&f=+";
        assert_eq!(
            "a%2Fb%20%25c%3Fd%23e%26f%3D%2B",
            encode_path_segment(reserved)
        );
        assert_eq!(Some(reserved.to_string()), decode_path_segment(&encode_path_segment(reserved)));
        assert_eq!(Some("a+b".to_string()), decode_path_segment("a+b"));
    }

    #[test]
    fn malformed_escapes_are_rejected() {
        for malformed in vec!["%2", "%zz", "%+1", "%-1", "abc%", "%4g", "ok%2Fthen%"] {
            assert_eq!(None, decode_path_segment(malformed), "{}", malformed);
        }
        // Well-formed escapes that aren't UTF-8.
        assert_eq!(None, decode_path_segment("%FF%FE"));
        assert_eq!(Some("%".to_string()), decode_path_segment("%25"));
    }
}
