//! Serialization format abstraction and content negotiation.
//!
//! Responses are only ever produced as JSON (via sonic-rs). A request whose
//! `Accept` header rules JSON out is rejected with 406.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::GatewayError;

/// Supported serialization formats.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum Format {
    #[default]
    Json,
}

impl std::str::FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application/json" => Ok(Format::Json),
            _ => Err(()),
        }
    }
}

impl Format {
    /// Picks the response format for an `Accept` header value.
    ///
    /// A missing or empty header accepts anything. Media ranges carrying
    /// `q=0` are treated as explicit refusals.
    pub fn negotiate(accept: Option<&str>) -> Result<Self, GatewayError> {
        let Some(accept) = accept.map(str::trim).filter(|a| !a.is_empty()) else {
            return Ok(Format::default());
        };

        for range in accept.split(',') {
            let mut parts = range.split(';');
            let media = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let refused = parts.any(|param| {
                param.split_once('=').is_some_and(|(key, value)| {
                    key.trim().eq_ignore_ascii_case("q")
                        && value.trim().parse::<f32>().is_ok_and(|q| q <= 0.0)
                })
            });
            if refused {
                continue;
            }
            match media.as_str() {
                "*/*" | "application/*" => return Ok(Format::Json),
                other => {
                    if let Ok(format) = other.parse() {
                        return Ok(format);
                    }
                }
            }
        }

        Err(GatewayError::NotAcceptable(format!(
            "cannot produce any of [{accept}]; supported: application/json"
        )))
    }

    /// Returns the MIME content type for this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Json => "application/json",
        }
    }

    /// Serialize the value to bytes.
    pub fn serialize<'a, T: Serialize>(self, val: &T) -> Result<Cow<'a, [u8]>, GatewayError> {
        match self {
            Format::Json => Ok(Cow::from(sonic_rs::to_vec(val)?)),
        }
    }

    /// Deserialize the provided value
    pub fn deserialize_owned<'a, T: Deserialize<'a>>(self, val: &'a [u8]) -> Result<T, GatewayError> {
        match self {
            Format::Json => Ok(sonic_rs::from_slice::<T>(val)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestStruct {
        name: String,
        value: i32,
    }

    #[test]
    fn test_format_default() {
        assert_eq!(Format::default(), Format::Json);
    }

    #[test]
    fn test_format_from_str_json() {
        assert_eq!(Format::from_str("application/json").unwrap(), Format::Json);
    }

    #[test]
    fn test_format_from_str_invalid() {
        assert!(Format::from_str("text/plain").is_err());
        assert!(Format::from_str("application/xml").is_err());
        assert!(Format::from_str("").is_err());
        assert!(Format::from_str("json").is_err());
    }

    #[test]
    fn test_negotiate_without_accept_header() {
        assert_eq!(Format::negotiate(None).unwrap(), Format::Json);
        assert_eq!(Format::negotiate(Some("")).unwrap(), Format::Json);
    }

    #[test]
    fn test_negotiate_wildcards() {
        assert_eq!(Format::negotiate(Some("*/*")).unwrap(), Format::Json);
        assert_eq!(Format::negotiate(Some("application/*")).unwrap(), Format::Json);
    }

    #[test]
    fn test_negotiate_json_with_parameters() {
        let accept = "application/json; charset=utf-8";
        assert_eq!(Format::negotiate(Some(accept)).unwrap(), Format::Json);
        assert_eq!(Format::negotiate(Some("Application/JSON")).unwrap(), Format::Json);
    }

    #[test]
    fn test_negotiate_picks_json_from_list() {
        let accept = "application/xml, application/json;q=0.9";
        assert_eq!(Format::negotiate(Some(accept)).unwrap(), Format::Json);
    }

    #[test]
    fn test_negotiate_xml_only_is_rejected() {
        let err = Format::negotiate(Some("application/xml")).unwrap_err();
        assert!(matches!(err, GatewayError::NotAcceptable(_)));
    }

    #[test]
    fn test_negotiate_refused_json() {
        let accept = "application/json;q=0, text/html";
        assert!(Format::negotiate(Some(accept)).is_err());
    }

    #[test]
    fn test_negotiate_refusal_spellings() {
        for accept in [
            "application/json;Q=0",
            "application/json;q=0.0000",
            "application/json; q = 0",
            "application/json;q=0, */*;q=0",
        ] {
            assert!(Format::negotiate(Some(accept)).is_err(), "{accept}");
        }
    }

    #[test]
    fn test_negotiate_nonzero_quality_is_accepted() {
        for accept in ["application/json;q=0.001", "application/json; Q = 1", "*/*;q=abc"] {
            assert_eq!(Format::negotiate(Some(accept)).unwrap(), Format::Json, "{accept}");
        }
    }

    #[test]
    fn test_content_type() {
        assert_eq!(Format::Json.content_type(), "application/json");
    }

    #[test]
    fn test_serialize_struct() {
        let test_data = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        let serialized = Format::Json.serialize(&test_data).unwrap();
        assert_eq!(serialized.as_ref(), br#"{"name":"test","value":42}"#);
    }

    #[test]
    fn test_deserialize_owned_struct() {
        let result: TestStruct = Format::Json
            .deserialize_owned(br#"{"name":"owned","value":200}"#)
            .unwrap();
        assert_eq!(result.name, "owned");
        assert_eq!(result.value, 200);
    }

    #[test]
    fn test_deserialize_owned_invalid_json() {
        let result: Result<TestStruct, GatewayError> = Format::Json.deserialize_owned(b"{invalid}");
        assert!(matches!(result, Err(GatewayError::Serialization(_))));
    }
}
