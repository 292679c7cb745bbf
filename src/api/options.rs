use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct MethodsOptions {
    /// Path prefix of the REST surface, without leading or trailing '/'.
    pub url_prefix: Option<String>,
    /// Upper bound of a forwarded request, round trip included.
    pub request_timeout: Option<Duration>,
    /// Accept responses carrying attributes this server doesn't know about.
    pub tolerate_unknown_fields: Option<bool>,
}

#[derive(Clone, Debug)]
pub(crate) struct MethodsOptionsValidated {
    pub url_prefix: String,
    pub request_timeout: Duration,
    pub tolerate_unknown_fields: bool,
}

impl MethodsOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.url_prefix.is_empty() {
            return Err("URL prefix must not be empty");
        }
        if self.url_prefix.starts_with('/') || self.url_prefix.ends_with('/') {
            return Err("URL prefix must not start or end with '/'");
        }
        if self.url_prefix.split('/').any(|segment| segment.is_empty()) {
            return Err("URL prefix must not contain empty segments");
        }
        if self.request_timeout == Duration::from_millis(0) {
            return Err("Request timeout must be greater than zero");
        }

        Ok(())
    }

    pub(crate) fn url_prefix_segments(&self) -> Vec<&str> {
        self.url_prefix.split('/').collect()
    }
}

impl TryFrom<MethodsOptions> for MethodsOptionsValidated {
    type Error = &'static str;

    fn try_from(options: MethodsOptions) -> Result<Self, Self::Error> {
        let values = MethodsOptionsValidated {
            url_prefix: options
                .url_prefix
                .unwrap_or_else(|| "_api/prototype-state".to_string()),
            request_timeout: options.request_timeout.unwrap_or(Duration::from_secs(30)),
            tolerate_unknown_fields: options.tolerate_unknown_fields.unwrap_or(true),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        let defaults = MethodsOptionsValidated::try_from(MethodsOptions::default()).unwrap();
        assert_eq!("_api/prototype-state", defaults.url_prefix);
        assert_eq!(Duration::from_secs(30), defaults.request_timeout);
        assert!(defaults.tolerate_unknown_fields);
        assert_eq!(vec!["_api", "prototype-state"], defaults.url_prefix_segments());

        let cases = vec![
            (Some("/api"), None, false),
            (Some("api/"), None, false),
            (Some(""), None, false),
            (Some("a//b"), None, false),
            (Some("api/v2/state"), None, true),
            (None, Some(Duration::from_millis(0)), false),
            (None, Some(Duration::from_millis(1)), true),
        ];
        for (url_prefix, request_timeout, valid) in cases {
            let options = MethodsOptions {
                url_prefix: url_prefix.map(String::from),
                request_timeout,
                tolerate_unknown_fields: None,
            };
            assert_eq!(
                valid,
                MethodsOptionsValidated::try_from(options).is_ok(),
                "{:?} {:?}",
                url_prefix,
                request_timeout
            );
        }
    }
}
