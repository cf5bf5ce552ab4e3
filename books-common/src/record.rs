use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?|ftp)://[^\s/$.?#].[^\s]*$").expect("URL pattern is a valid regex")
});

/// Whether `url` looks like scheme://host/path with an http, https or ftp scheme.
pub fn is_acceptable_url(url: &str) -> bool {
    URL_PATTERN.is_match(url)
}

/// Enumeration of reasons a listing cannot become a `Record`.
#[derive(Error, Debug, PartialEq)]
pub enum RecordError {
    #[error("title is empty")]
    EmptyTitle,
    #[error("author is empty")]
    EmptyAuthor,
    #[error("seller is missing")]
    MissingSeller,
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),
    #[error("not an http, https or ftp URL: {0}")]
    InvalidUrl(String),
}

/// A book listing as it flows between stages.
///
/// Fields are private and there are no mutating methods: a stage that needs a
/// different listing builds a new one. Sellers are identified by `seller_id`;
/// bodies using the older `seller_name` key deserialize into the same field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord")]
pub struct Record {
    title: String,
    author: String,
    #[serde(serialize_with = "serialize_price")]
    price: Decimal,
    seller_id: String,
    seller_rating: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl Record {
    pub fn new(
        title: &str,
        author: &str,
        price: Decimal,
        seller_id: &str,
        seller_rating: f64,
        url: Option<&str>,
    ) -> Result<Self, RecordError> {
        if title.trim().is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        if author.trim().is_empty() {
            return Err(RecordError::EmptyAuthor);
        }
        if seller_id.trim().is_empty() {
            return Err(RecordError::MissingSeller);
        }
        if price <= Decimal::ZERO {
            return Err(RecordError::NonPositivePrice(price));
        }
        let url = url.filter(|url| !url.is_empty());
        if let Some(url) = url {
            if !is_acceptable_url(url) {
                return Err(RecordError::InvalidUrl(url.to_owned()));
            }
        }

        Ok(Self {
            title: title.to_owned(),
            author: author.to_owned(),
            price,
            seller_id: seller_id.to_owned(),
            seller_rating,
            url: url.map(str::to_owned),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn seller_id(&self) -> &str {
        &self.seller_id
    }

    pub fn seller_rating(&self) -> f64 {
        self.seller_rating
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// The shape listings have on the wire, before `Record` invariants are checked.
#[derive(Deserialize)]
struct WireRecord {
    title: String,
    author: String,
    #[serde(deserialize_with = "deserialize_price")]
    price: Decimal,
    #[serde(default, deserialize_with = "deserialize_text")]
    seller_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    seller_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_rating")]
    seller_rating: f64,
    #[serde(default)]
    url: Option<String>,
}

impl TryFrom<WireRecord> for Record {
    type Error = RecordError;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        let seller = wire
            .seller_id
            .filter(|seller| !seller.trim().is_empty())
            .or(wire.seller_name)
            .ok_or(RecordError::MissingSeller)?;

        Record::new(
            &wire.title,
            &wire.author,
            wire.price,
            &seller,
            wire.seller_rating,
            wire.url.as_deref(),
        )
    }
}

/// Read a price from a JSON string or number without going through binary floating point.
/// Returns `None` for anything that is not a number; the sign is left for the caller to check.
pub fn parse_price(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_owned(),
        _ => return None,
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn deserialize_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_price(&value).ok_or_else(|| de::Error::custom(format!("invalid price: {value}")))
}

/// Prices are written as strings so the next stage reads back the exact decimal.
fn serialize_price<S>(price: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(price)
}

/// Non-string values are read as absent, the same way the validator sees them.
fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

fn deserialize_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0.0),
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| de::Error::custom(format!("invalid seller rating: {number}"))),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid seller rating: {text}"))),
        other => Err(de::Error::custom(format!("invalid seller rating: {other}"))),
    }
}
