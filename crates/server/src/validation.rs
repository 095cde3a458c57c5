//! Request validation helpers. Field errors collect into a `{field: [messages]}`
//! map that becomes a 422 `validation_failed` response.

use marquee_core::error::ApiError;
use marquee_core::types::{MediaType, PlanInterval};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NAME_LEN: usize = 64;
pub const MIN_REVIEW_LEN: usize = 10;
pub const MAX_REVIEW_LEN: usize = 5000;
pub const MAX_REVIEW_TITLE_LEN: usize = 120;
pub const MAX_QUERY_LEN: usize = 100;
pub const MAX_PLAN_FEATURES: usize = 20;
pub const MAX_FEATURE_LEN: usize = 120;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").unwrap());

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").unwrap());

/// Accumulates field-level errors.
#[derive(Debug, Default)]
pub struct FieldErrors {
    fields: Map<String, Value>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let entry = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| json!([]));
        if let Value::Array(list) = entry {
            list.push(Value::String(message.into()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(Value::Object(self.fields)))
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        errors.add("email", "must be a valid email address");
    }
}

pub fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    let len = char_len(password);
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        errors.add(
            field,
            format!("must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"),
        );
    }
}

pub fn check_name(errors: &mut FieldErrors, name: &str) {
    let len = char_len(name.trim());
    if len == 0 || len > MAX_NAME_LEN {
        errors.add("name", format!("must be between 1 and {MAX_NAME_LEN} characters"));
    }
}

pub fn check_image_url(errors: &mut FieldErrors, image: &str) {
    let ok = url::Url::parse(image)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false);
    if !ok {
        errors.add("image", "must be an http(s) URL");
    }
}

pub fn check_review(errors: &mut FieldErrors, title: Option<&str>, body: &str) {
    let len = char_len(body.trim());
    if !(MIN_REVIEW_LEN..=MAX_REVIEW_LEN).contains(&len) {
        errors.add(
            "body",
            format!("must be between {MIN_REVIEW_LEN} and {MAX_REVIEW_LEN} characters"),
        );
    }
    if let Some(title) = title {
        if char_len(title.trim()) > MAX_REVIEW_TITLE_LEN {
            errors.add(
                "title",
                format!("must be at most {MAX_REVIEW_TITLE_LEN} characters"),
            );
        }
    }
}

pub fn check_plan(
    errors: &mut FieldErrors,
    name: &str,
    price_cents: i64,
    currency: &str,
    interval: &str,
    features: &[String],
) {
    let name_len = char_len(name.trim());
    if name_len == 0 || name_len > MAX_NAME_LEN {
        errors.add("name", format!("must be between 1 and {MAX_NAME_LEN} characters"));
    }
    if price_cents <= 0 {
        errors.add("price_cents", "must be greater than 0");
    }
    if !CURRENCY_RE.is_match(currency) {
        errors.add("currency", "must be a 3-letter uppercase currency code");
    }
    if PlanInterval::parse(interval).is_none() {
        errors.add("interval", "must be 'month' or 'year'");
    }
    if features.len() > MAX_PLAN_FEATURES {
        errors.add(
            "features",
            format!("must have at most {MAX_PLAN_FEATURES} items"),
        );
    }
    if features.iter().any(|f| {
        let len = char_len(f.trim());
        len == 0 || len > MAX_FEATURE_LEN
    }) {
        errors.add(
            "features",
            format!("each feature must be between 1 and {MAX_FEATURE_LEN} characters"),
        );
    }
}

pub fn parse_media_type(raw: &str) -> Result<MediaType, ApiError> {
    MediaType::parse(raw).ok_or_else(|| ApiError::field("media_type", "must be 'movie' or 'tv'"))
}

pub fn parse_optional_media_type(raw: Option<&str>) -> Result<Option<MediaType>, ApiError> {
    raw.filter(|s| !s.is_empty())
        .map(parse_media_type)
        .transpose()
}

pub fn check_tmdb_id(tmdb_id: i64) -> Result<(), ApiError> {
    if tmdb_id <= 0 {
        return Err(ApiError::field("tmdb_id", "must be a positive integer"));
    }
    Ok(())
}

/// Validate a `{media_type}/{tmdb_id}` pair from a path or body.
pub fn title_key(media_type: &str, tmdb_id: i64) -> Result<(MediaType, i64), ApiError> {
    let media = parse_media_type(media_type)?;
    check_tmdb_id(tmdb_id)?;
    Ok((media, tmdb_id))
}

/// Trim and bound a search query.
pub fn search_query(raw: Option<&str>) -> Result<String, ApiError> {
    let q = raw.unwrap_or_default().trim();
    let len = char_len(q);
    if len == 0 || len > MAX_QUERY_LEN {
        return Err(ApiError::field(
            "q",
            format!("must be between 1 and {MAX_QUERY_LEN} characters"),
        ));
    }
    Ok(q.to_string())
}

/// Split a display name into first and last for payment forms.
pub fn split_name(name: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return (None, None);
    };
    match name.split_once(char::is_whitespace) {
        Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
        None => (Some(name.to_string()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(f: impl FnOnce(&mut FieldErrors)) -> Value {
        let mut errors = FieldErrors::new();
        f(&mut errors);
        match errors.into_result() {
            Err(ApiError::Validation(fields)) => fields,
            _ => Value::Null,
        }
    }

    #[test]
    fn email_rules() {
        assert_eq!(errors_of(|e| check_email(e, "viewer@example.com")), Value::Null);
        assert!(errors_of(|e| check_email(e, "viewer@localhost"))["email"].is_array());
        assert!(errors_of(|e| check_email(e, "no-at-sign.com"))["email"].is_array());
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(errors_of(|e| check_email(e, &long))["email"].is_array());
    }

    #[test]
    fn password_and_name_bounds() {
        let fields = errors_of(|e| {
            check_password(e, "password", "short");
            check_name(e, "   ");
        });
        assert!(fields["password"].is_array());
        assert!(fields["name"].is_array());

        assert_eq!(
            errors_of(|e| check_password(e, "password", &"x".repeat(128))),
            Value::Null
        );
    }

    #[test]
    fn image_must_be_http_url() {
        assert_eq!(
            errors_of(|e| check_image_url(e, "https://cdn.example.com/me.png")),
            Value::Null
        );
        assert!(errors_of(|e| check_image_url(e, "javascript:alert(1)"))["image"].is_array());
        assert!(errors_of(|e| check_image_url(e, "not a url"))["image"].is_array());
    }

    #[test]
    fn plan_rules_collect_every_problem() {
        let features = vec!["HD".to_string(), "".to_string()];
        let fields = errors_of(|e| check_plan(e, "", 0, "etb", "week", &features));
        for key in ["name", "price_cents", "currency", "interval", "features"] {
            assert!(fields[key].is_array(), "{key}");
        }

        let ok = vec!["4K".to_string()];
        assert_eq!(
            errors_of(|e| check_plan(e, "Premium", 29900, "ETB", "month", &ok)),
            Value::Null
        );
    }

    #[test]
    fn review_bounds() {
        let fields = errors_of(|e| check_review(e, Some(&"t".repeat(121)), "too short"));
        assert!(fields["body"].is_array());
        assert!(fields["title"].is_array());
    }

    #[test]
    fn title_key_rejects_bad_input() {
        assert!(title_key("movie", 550).is_ok());
        assert!(title_key("anime", 550).is_err());
        assert!(title_key("tv", 0).is_err());
    }

    #[test]
    fn search_query_is_trimmed() {
        assert_eq!(search_query(Some("  dune ")).unwrap(), "dune");
        assert!(search_query(Some("   ")).is_err());
        assert!(search_query(None).is_err());
        assert!(search_query(Some(&"q".repeat(101))).is_err());
    }

    #[test]
    fn names_split_on_first_space() {
        assert_eq!(
            split_name(Some("Abebe Bikila Jr")),
            (Some("Abebe".into()), Some("Bikila Jr".into()))
        );
        assert_eq!(split_name(Some("Cher")), (Some("Cher".into()), None));
        assert_eq!(split_name(None), (None, None));
    }
}
