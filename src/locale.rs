//! Content locales and the request they shape.
//!
//! A locale decides three things about a capture: the `Accept-Language`
//! header, the emulated browser locale, and the emulated timezone. The
//! timezone is a fixed function of the locale code.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const TOKYO_TIMEZONE: &str = "Asia/Tokyo";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Map any locale string to its timezone: codes containing `ja` are Tokyo,
/// everything else is UTC.
pub fn timezone_for(code: &str) -> &'static str {
    if code.contains("ja") {
        TOKYO_TIMEZONE
    } else {
        DEFAULT_TIMEZONE
    }
}

/// Content locales a capture can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locale {
    #[default]
    JaJp,
    EnUs,
    ZhCn,
    KoKr,
}

impl Locale {
    pub const ALL: [Locale; 4] = [Locale::JaJp, Locale::EnUs, Locale::ZhCn, Locale::KoKr];

    /// Language-region tag, e.g. `ja-JP`
    pub fn code(self) -> &'static str {
        match self {
            Locale::JaJp => "ja-JP",
            Locale::EnUs => "en-US",
            Locale::ZhCn => "zh-CN",
            Locale::KoKr => "ko-KR",
        }
    }

    /// Bare language subtag, e.g. `ja`
    pub fn language(self) -> &'static str {
        match self {
            Locale::JaJp => "ja",
            Locale::EnUs => "en",
            Locale::ZhCn => "zh",
            Locale::KoKr => "ko",
        }
    }

    pub fn timezone(self) -> &'static str {
        timezone_for(self.code())
    }

    /// Value sent as `Accept-Language`, preferring the regional variant.
    pub fn accept_language(self) -> String {
        format!("{},{};q=0.9", self.code(), self.language())
    }
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().replace('_', "-");
        Locale::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| {
                Error::ConfigError(format!(
                    "unknown locale '{}' (expected one of ja-JP, en-US, zh-CN, ko-KR)",
                    s
                ))
            })
    }
}

impl TryFrom<String> for Locale {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.code().to_string()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Everything a renderer needs to capture one page.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub source_url: Url,
    pub locale: Locale,
    pub user_agent: String,
    pub timezone_id: &'static str,
}

impl CaptureRequest {
    /// Validate `source_url` and bind it to a locale.
    ///
    /// Only absolute `http`/`https` URLs are accepted.
    pub fn new(source_url: &str, locale: Locale, user_agent: impl Into<String>) -> Result<Self> {
        let trimmed = source_url.trim();
        if trimmed.is_empty() {
            return Err(Error::ConfigError("source URL is empty".into()));
        }
        let source_url = Url::parse(trimmed)?;
        if !matches!(source_url.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "unsupported URL scheme '{}'",
                source_url.scheme()
            )));
        }
        Ok(Self {
            source_url,
            locale,
            user_agent: user_agent.into(),
            timezone_id: locale.timezone(),
        })
    }

    pub fn accept_language(&self) -> String {
        self.locale.accept_language()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn japanese_maps_to_tokyo() {
        assert_eq!(Locale::JaJp.timezone(), "Asia/Tokyo");
        assert_eq!(timezone_for("ja"), "Asia/Tokyo");
    }

    #[test]
    fn other_locales_map_to_utc() {
        assert_eq!(Locale::EnUs.timezone(), "UTC");
        assert_eq!(Locale::ZhCn.timezone(), "UTC");
        assert_eq!(Locale::KoKr.timezone(), "UTC");
        assert_eq!(timezone_for("fr-FR"), "UTC");
    }

    #[test]
    fn parses_known_codes_loosely() {
        assert_eq!("ja-JP".parse::<Locale>().unwrap(), Locale::JaJp);
        assert_eq!("en_us".parse::<Locale>().unwrap(), Locale::EnUs);
        assert_eq!(" ko-KR ".parse::<Locale>().unwrap(), Locale::KoKr);
        assert!("xx-YY".parse::<Locale>().is_err());
    }

    #[test]
    fn accept_language_prefers_region() {
        assert_eq!(Locale::JaJp.accept_language(), "ja-JP,ja;q=0.9");
        assert_eq!(Locale::default(), Locale::JaJp);
    }

    #[test]
    fn locale_serializes_as_code() {
        let json = serde_json::to_string(&Locale::ZhCn).unwrap();
        assert_eq!(json, "\"zh-CN\"");
        let back: Locale = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Locale::ZhCn);
    }

    #[test]
    fn capture_request_rejects_bad_urls() {
        assert!(CaptureRequest::new("", Locale::JaJp, "ua").is_err());
        assert!(CaptureRequest::new("example.com/page", Locale::JaJp, "ua").is_err());
        assert!(CaptureRequest::new("ftp://example.com/", Locale::JaJp, "ua").is_err());

        let req = CaptureRequest::new("https://example.com/x", Locale::EnUs, "ua").unwrap();
        assert_eq!(req.timezone_id, "UTC");
        assert_eq!(req.source_url.as_str(), "https://example.com/x");
    }
}
