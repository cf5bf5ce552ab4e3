use books_common::record::{is_acceptable_url, parse_price};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

/// A rule a listing broke. These are normal outcomes, not failures of the stage.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid price")]
    InvalidPrice,
    #[error("Author name is required")]
    MissingAuthor,
    #[error("Book title is required")]
    MissingTitle,
    #[error("Seller name is required")]
    MissingSeller,
    #[error("Invalid URL")]
    InvalidUrl,
}

/// The body could not be read as a listing at all.
#[derive(Error, Debug)]
pub enum MalformedListing {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("body is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

pub type Listing = Map<String, Value>;

pub fn parse_listing(body: &str) -> Result<Listing, MalformedListing> {
    match serde_json::from_str(body)? {
        Value::Object(listing) => Ok(listing),
        Value::Array(_) => Err(MalformedListing::NotAnObject("array")),
        Value::String(_) => Err(MalformedListing::NotAnObject("string")),
        Value::Number(_) => Err(MalformedListing::NotAnObject("number")),
        Value::Bool(_) => Err(MalformedListing::NotAnObject("boolean")),
        Value::Null => Err(MalformedListing::NotAnObject("null")),
    }
}

/// Check a listing against every rule. An empty result means the listing is valid.
/// Errors come back in a fixed order, so the same listing always yields the same list.
pub fn validate_listing(listing: &Listing) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let price_is_positive = listing
        .get("price")
        .and_then(parse_price)
        .is_some_and(|price| price > Decimal::ZERO);
    if !price_is_positive {
        errors.push(ValidationError::InvalidPrice);
    }

    if !has_text(listing, "author") {
        errors.push(ValidationError::MissingAuthor);
    }

    if !has_text(listing, "title") {
        errors.push(ValidationError::MissingTitle);
    }

    if !has_text(listing, "seller_name") && !has_text(listing, "seller_id") {
        errors.push(ValidationError::MissingSeller);
    }

    if !url_is_acceptable(listing.get("url")) {
        errors.push(ValidationError::InvalidUrl);
    }

    errors
}

fn has_text(listing: &Listing, key: &str) -> bool {
    matches!(listing.get(key), Some(Value::String(text)) if !text.trim().is_empty())
}

/// A missing, null or empty URL is fine; anything else must look like scheme://host/path.
fn url_is_acceptable(url: Option<&Value>) -> bool {
    match url {
        None | Some(Value::Null) => true,
        Some(Value::String(url)) if url.is_empty() => true,
        Some(Value::String(url)) => is_acceptable_url(url),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(value: Value) -> Listing {
        match value {
            Value::Object(listing) => listing,
            other => panic!("not an object: {other}"),
        }
    }

    fn valid_listing() -> Listing {
        listing(json!({
            "title": "The Left Hand of Darkness",
            "author": "Ursula K. Le Guin",
            "price": "14.99",
            "seller_name": "bookworm",
            "seller_rating": 4.2,
            "url": "https://books.example.com/left-hand",
        }))
    }

    #[test]
    fn test_valid_listing_has_no_errors() {
        assert!(validate_listing(&valid_listing()).is_empty());

        let mut without_url = valid_listing();
        without_url.remove("url");
        assert!(validate_listing(&without_url).is_empty());

        let mut with_seller_id = valid_listing();
        with_seller_id.remove("seller_name");
        with_seller_id.insert("seller_id".to_owned(), json!("s-9"));
        assert!(validate_listing(&with_seller_id).is_empty());
    }

    #[test]
    fn test_non_positive_prices_are_rejected() {
        for price in [json!(0), json!(-1), json!("0.00"), json!("-2.50"), json!(-0.01)] {
            let mut candidate = valid_listing();
            candidate.insert("price".to_owned(), price.clone());

            assert_eq!(
                validate_listing(&candidate),
                vec![ValidationError::InvalidPrice],
                "price {price} should be rejected"
            );
        }
    }

    #[test]
    fn test_unreadable_prices_are_rejected() {
        for price in [json!(null), json!("free"), json!(""), json!([5])] {
            let mut candidate = valid_listing();
            candidate.insert("price".to_owned(), price);
            assert_eq!(validate_listing(&candidate), vec![ValidationError::InvalidPrice]);
        }

        let mut missing = valid_listing();
        missing.remove("price");
        assert_eq!(validate_listing(&missing), vec![ValidationError::InvalidPrice]);
    }

    #[test]
    fn test_numeric_prices_are_accepted() {
        let mut candidate = valid_listing();
        candidate.insert("price".to_owned(), json!(3));
        assert!(validate_listing(&candidate).is_empty());

        candidate.insert("price".to_owned(), json!(" 0.01 "));
        assert!(validate_listing(&candidate).is_empty());
    }

    #[test]
    fn test_blank_fields_are_required() {
        let candidate = listing(json!({
            "title": "   ",
            "author": "\t",
            "price": "10",
            "seller_name": "",
        }));

        assert_eq!(
            validate_listing(&candidate),
            vec![
                ValidationError::MissingAuthor,
                ValidationError::MissingTitle,
                ValidationError::MissingSeller,
            ]
        );
    }

    #[test]
    fn test_everything_wrong_reports_every_rule_in_order() {
        let candidate = listing(json!({"url": "not a url", "author": 42}));

        assert_eq!(
            validate_listing(&candidate),
            vec![
                ValidationError::InvalidPrice,
                ValidationError::MissingAuthor,
                ValidationError::MissingTitle,
                ValidationError::MissingSeller,
                ValidationError::InvalidUrl,
            ]
        );
    }

    #[test]
    fn test_url_rules() {
        let accepted = [
            json!("http://example.com"),
            json!("https://example.com/books/1?ref=feed"),
            json!("ftp://files.example.com/catalog.csv"),
            json!(""),
            json!(null),
        ];
        for url in accepted {
            assert!(url_is_acceptable(Some(&url)), "{url} should be accepted");
        }
        assert!(url_is_acceptable(None));

        let rejected = [
            json!("mailto:someone@example.com"),
            json!("https://"),
            json!("http://exa mple.com"),
            json!("gopher://example.com"),
            json!("example.com/book"),
            json!(7),
        ];
        for url in rejected {
            assert!(!url_is_acceptable(Some(&url)), "{url} should be rejected");
        }
    }

    #[test]
    fn test_validation_is_idempotent() {
        let candidate = listing(json!({"title": "T", "price": "-3", "url": "bad"}));

        let first = validate_listing(&candidate);
        let second = validate_listing(&candidate);

        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_parse_listing() {
        assert!(parse_listing(r#"{"title": "x"}"#).is_ok());
        assert!(matches!(
            parse_listing("{not json"),
            Err(MalformedListing::InvalidJson(_))
        ));
        assert!(matches!(
            parse_listing("[1, 2]"),
            Err(MalformedListing::NotAnObject("array"))
        ));
        assert_eq!(
            ValidationError::InvalidPrice.to_string(),
            "Invalid price".to_owned()
        );
    }
}
