//! Translation of raw query-string parameters into store filters, sort keys and page windows.

use std::{cmp::Ordering, fmt};

use mongodb::bson::{doc, Document};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::ListingAttributes;

/// Page size used when the caller does not send `limit`.
pub const DEFAULT_PAGE_SIZE: u64 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("query parameter `{param}` must be a positive integer, got {value:?}")]
    NotANumber { param: &'static str, value: String },

    #[error("query parameter `{0}` is out of range")]
    OutOfRange(&'static str),

    #[error("cannot sort by {0:?}; sortable fields are price, rating, quantity, toyName, category")]
    UnsortableField(String),

    #[error("unknown sort direction {0:?}; use asc or desc")]
    UnknownDirection(String),
}

/// Raw listing query parameters, exactly as they arrive in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub asc: Option<String>,
    pub email: Option<String>,
}

impl ListingParams {
    pub fn pagination(&self) -> Result<Pagination, QueryError> {
        Pagination::parse(self.page.as_deref(), self.limit.as_deref())
    }

    pub fn sort_key(&self) -> Result<Option<SortKey>, QueryError> {
        SortKey::parse(self.sort.as_deref(), self.asc.as_deref())
    }

    /// Owner filter for the seller dashboard. Without `email` every listing matches.
    pub fn owner_filter(&self) -> ListingFilter {
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => ListingFilter::SellerEmail(email.to_string()),
            _ => ListingFilter::All,
        }
    }
}

/// 1-based page over a result set. The skip offset always derives from the same `limit`
/// that bounds the page, so consecutive pages tile the results without gaps or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Result<Pagination, QueryError> {
        let defaults = Pagination::default();
        let pagination = Pagination {
            page: parse_positive("page", page)?.unwrap_or(defaults.page),
            limit: parse_positive("limit", limit)?.unwrap_or(defaults.limit),
        };

        // The store takes skip and limit as signed 64-bit integers.
        if i64::try_from(pagination.limit).is_err() {
            return Err(QueryError::OutOfRange("limit"));
        }
        let skip = (pagination.page - 1).checked_mul(pagination.limit);
        if !skip.is_some_and(|skip| i64::try_from(skip).is_ok()) {
            return Err(QueryError::OutOfRange("page"));
        }

        Ok(pagination)
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn parse_positive(param: &'static str, raw: Option<&str>) -> Result<Option<u64>, QueryError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    match raw.parse::<u64>() {
        Ok(0) => Err(QueryError::OutOfRange(param)),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(QueryError::NotANumber {
            param,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Rating,
    Quantity,
    ToyName,
    Category,
}

impl SortField {
    pub fn parse(raw: &str) -> Result<SortField, QueryError> {
        match raw.trim() {
            "price" => Ok(SortField::Price),
            "rating" | "Rating" => Ok(SortField::Rating),
            "quantity" => Ok(SortField::Quantity),
            "toyName" | "name" => Ok(SortField::ToyName),
            "category" => Ok(SortField::Category),
            other => Err(QueryError::UnsortableField(other.to_string())),
        }
    }

    /// Field name as stored in the collection.
    pub fn store_name(&self) -> &'static str {
        match self {
            SortField::Price => "price",
            SortField::Rating => "Rating",
            SortField::Quantity => "quantity",
            SortField::ToyName => "toyName",
            SortField::Category => "category",
        }
    }

    pub fn value<'a>(&self, attributes: &'a ListingAttributes) -> Option<&'a Value> {
        match self {
            SortField::Price => attributes.price.as_ref(),
            SortField::Rating => attributes.rating.as_ref(),
            SortField::Quantity => attributes.quantity.as_ref(),
            SortField::ToyName => attributes.toy_name.as_ref(),
            SortField::Category => attributes.category.as_ref(),
        }
    }

    pub fn compare(&self, a: &ListingAttributes, b: &ListingAttributes) -> Ordering {
        compare_values(self.value(a), self.value(b))
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Result<SortDirection, QueryError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "asc" | "ascending" | "true" => Ok(SortDirection::Ascending),
            "-1" | "desc" | "descending" | "false" => Ok(SortDirection::Descending),
            _ => Err(QueryError::UnknownDirection(raw.to_string())),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    /// `sort=<field>` with an optional `asc` direction, or the shorthand `sort=asc|desc`
    /// which orders by price.
    pub fn parse(sort: Option<&str>, asc: Option<&str>) -> Result<Option<SortKey>, QueryError> {
        let Some(sort) = sort.map(str::trim).filter(|sort| !sort.is_empty()) else {
            return Ok(None);
        };

        let shorthand = match sort.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Ascending),
            "desc" => Some(SortDirection::Descending),
            _ => None,
        };
        if let Some(direction) = shorthand {
            return Ok(Some(SortKey {
                field: SortField::Price,
                direction,
            }));
        }

        let field = SortField::parse(sort)?;
        let direction = match asc.map(str::trim).filter(|asc| !asc.is_empty()) {
            Some(raw) => SortDirection::parse(raw)?,
            None => SortDirection::default(),
        };

        Ok(Some(SortKey { field, direction }))
    }

    pub fn to_document(&self) -> Document {
        let mut document = Document::new();
        document.insert(self.field.store_name(), self.direction.as_i32());
        document
    }

    pub fn compare(&self, a: &ListingAttributes, b: &ListingAttributes) -> Ordering {
        let ordering = self.field.compare(a, b);
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Ascending order over untyped values, ranked by type the way the store ranks BSON types:
/// missing or null, then numbers, strings, objects, arrays and booleans.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Object(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Bool(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => Ordering::Equal,
            },
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Array(a)), Some(Value::Array(b))) => a
            .iter()
            .zip(b)
            .map(|(a, b)| compare_values(Some(a), Some(b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Some(Value::Object(a)), Some(Value::Object(b))) => a
            .iter()
            .zip(b)
            .map(|((ka, va), (kb, vb))| {
                ka.cmp(kb)
                    .then_with(|| compare_values(Some(va), Some(vb)))
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingFilter {
    All,
    /// Case-insensitive, unanchored substring of `toyName`.
    NameContains(String),
    /// Case-insensitive, unanchored substring of `category`.
    CategoryContains(String),
    /// Exact match on `sellerEmail`.
    SellerEmail(String),
}

impl ListingFilter {
    pub fn to_document(&self) -> Document {
        match self {
            ListingFilter::All => doc! {},
            ListingFilter::NameContains(text) => contains_pattern("toyName", text),
            ListingFilter::CategoryContains(text) => contains_pattern("category", text),
            ListingFilter::SellerEmail(email) => doc! { "sellerEmail": email },
        }
    }

    /// In-memory counterpart of `to_document`. Only string values can match, as with `$regex`.
    pub fn matches(&self, attributes: &ListingAttributes) -> bool {
        fn text(field: &Option<Value>) -> Option<&str> {
            field.as_ref().and_then(Value::as_str)
        }

        fn contains(field: Option<&str>, text: &str) -> bool {
            field.is_some_and(|value| value.to_lowercase().contains(&text.to_lowercase()))
        }

        match self {
            ListingFilter::All => true,
            ListingFilter::NameContains(search) => {
                contains(text(&attributes.toy_name), search)
            }
            ListingFilter::CategoryContains(search) => {
                contains(text(&attributes.category), search)
            }
            ListingFilter::SellerEmail(email) => {
                text(&attributes.seller_email) == Some(email.as_str())
            }
        }
    }
}

// The search text is matched literally; metacharacters never reach the regex engine.
fn contains_pattern(field: &str, text: &str) -> Document {
    let mut document = Document::new();
    document.insert(field, doc! { "$regex": regex::escape(text), "$options": "i" });
    document
}

/// Sort and slice applied to a `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindWindow {
    pub sort: Option<SortKey>,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindWindow {
    pub fn sorted(sort: Option<SortKey>) -> FindWindow {
        FindWindow {
            sort,
            ..Default::default()
        }
    }

    pub fn page(pagination: Pagination, sort: Option<SortKey>) -> FindWindow {
        FindWindow {
            sort,
            skip: pagination.skip(),
            limit: Some(pagination.limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::Bson;
    use serde_json::json;

    use super::*;

    fn priced(price: Option<Value>) -> ListingAttributes {
        ListingAttributes {
            price,
            ..Default::default()
        }
    }

    #[test]
    fn pagination_defaults_to_first_page_of_five() {
        let pagination = Pagination::parse(None, None).unwrap();
        assert_eq!(pagination, Pagination { page: 1, limit: 5 });
        assert_eq!(pagination.skip(), 0);
    }

    #[test]
    fn skip_follows_the_requested_limit() {
        let pagination = Pagination::parse(Some("3"), Some("20")).unwrap();
        assert_eq!(pagination.skip(), 40);

        let window = FindWindow::page(pagination, None);
        assert_eq!(window.skip, 40);
        assert_eq!(window.limit, Some(20));
    }

    #[test]
    fn zero_and_garbage_pages_are_rejected() {
        assert_eq!(
            Pagination::parse(Some("0"), None),
            Err(QueryError::OutOfRange("page"))
        );
        assert_eq!(
            Pagination::parse(None, Some("0")),
            Err(QueryError::OutOfRange("limit"))
        );
        assert_eq!(
            Pagination::parse(Some("two"), None),
            Err(QueryError::NotANumber {
                param: "page",
                value: String::from("two")
            })
        );
        assert!(Pagination::parse(None, Some("-3")).is_err());
    }

    #[test]
    fn skips_beyond_what_the_store_accepts_are_rejected() {
        assert_eq!(
            Pagination::parse(Some("18446744073709551615"), None),
            Err(QueryError::OutOfRange("page"))
        );
        assert_eq!(
            Pagination::parse(Some("3"), Some("9223372036854775807")),
            Err(QueryError::OutOfRange("page"))
        );
        assert_eq!(
            Pagination::parse(None, Some("18446744073709551615")),
            Err(QueryError::OutOfRange("limit"))
        );

        let last = Pagination::parse(Some("2"), Some("4611686018427387903")).unwrap();
        assert_eq!(last.skip(), 4611686018427387903);
    }

    #[test]
    fn blank_parameters_fall_back_to_defaults() {
        assert_eq!(
            Pagination::parse(Some(""), Some(" ")).unwrap(),
            Pagination::default()
        );
    }

    #[test]
    fn sort_accepts_whitelisted_fields_and_directions() {
        let key = SortKey::parse(Some("rating"), Some("-1")).unwrap().unwrap();
        assert_eq!(key.field, SortField::Rating);
        assert_eq!(key.direction, SortDirection::Descending);
        assert_eq!(key.to_document(), doc! { "Rating": -1 });

        let key = SortKey::parse(Some("toyName"), None).unwrap().unwrap();
        assert_eq!(key.direction, SortDirection::Ascending);
    }

    #[test]
    fn sort_shorthand_orders_by_price() {
        let key = SortKey::parse(Some("desc"), None).unwrap().unwrap();
        assert_eq!(key.to_document(), doc! { "price": -1 });

        let key = SortKey::parse(Some("asc"), None).unwrap().unwrap();
        assert_eq!(key.to_document(), doc! { "price": 1 });
    }

    #[test]
    fn only_asc_and_desc_are_sort_shorthands() {
        for raw in ["true", "false", "ascending", "descending", "-1"] {
            assert_eq!(
                SortKey::parse(Some(raw), None),
                Err(QueryError::UnsortableField(raw.to_string())),
                "{raw:?} should not sort by price"
            );
        }
    }

    #[test]
    fn unknown_sort_input_is_rejected() {
        assert_eq!(
            SortKey::parse(Some("$where"), None),
            Err(QueryError::UnsortableField(String::from("$where")))
        );
        assert_eq!(
            SortKey::parse(Some("_id"), None),
            Err(QueryError::UnsortableField(String::from("_id")))
        );
        assert_eq!(
            SortKey::parse(Some("1"), None),
            Err(QueryError::UnsortableField(String::from("1")))
        );
        assert_eq!(
            SortKey::parse(Some("price"), Some("sideways")),
            Err(QueryError::UnknownDirection(String::from("sideways")))
        );
        assert_eq!(SortKey::parse(None, Some("-1")), Ok(None));
    }

    #[test]
    fn missing_values_sort_first() {
        let key = SortKey {
            field: SortField::Price,
            direction: SortDirection::Ascending,
        };
        let mut items = vec![
            priced(Some(json!(9.0))),
            priced(None),
            priced(Some(json!(1.5))),
            priced(Some(Value::Null)),
        ];
        items.sort_by(|a, b| key.compare(a, b));

        let prices: Vec<Option<Value>> = items.into_iter().map(|a| a.price).collect();
        assert_eq!(
            prices,
            vec![None, Some(Value::Null), Some(json!(1.5)), Some(json!(9.0))]
        );
    }

    #[test]
    fn mixed_types_sort_numbers_before_strings() {
        let key = SortKey {
            field: SortField::Price,
            direction: SortDirection::Ascending,
        };
        let mut items = vec![
            priced(Some(json!("N/A"))),
            priced(Some(json!(true))),
            priced(Some(json!(12))),
            priced(Some(json!("$25"))),
            priced(Some(json!(3.5))),
            priced(None),
        ];
        items.sort_by(|a, b| key.compare(a, b));

        let prices: Vec<Option<Value>> = items.into_iter().map(|a| a.price).collect();
        assert_eq!(
            prices,
            vec![
                None,
                Some(json!(3.5)),
                Some(json!(12)),
                Some(json!("$25")),
                Some(json!("N/A")),
                Some(json!(true)),
            ]
        );
    }

    #[test]
    fn substring_filters_escape_the_search_text() {
        let filter = ListingFilter::NameContains(String::from("spider.man"));
        let document = filter.to_document();
        let pattern = document.get_document("toyName").unwrap();

        assert_eq!(
            pattern.get("$regex"),
            Some(&Bson::String(String::from(r"spider\.man")))
        );
        assert_eq!(pattern.get("$options"), Some(&Bson::String(String::from("i"))));
    }

    #[test]
    fn substring_filters_ignore_case() {
        let attributes = ListingAttributes {
            toy_name: Some(json!("Spider-Man Pop")),
            category: Some(json!("Action Figures")),
            ..Default::default()
        };

        assert!(ListingFilter::CategoryContains(String::from("ACTION")).matches(&attributes));
        assert!(ListingFilter::CategoryContains(String::from("action")).matches(&attributes));
        assert!(ListingFilter::NameContains(String::from("man p")).matches(&attributes));
        assert!(!ListingFilter::NameContains(String::from("batman")).matches(&attributes));

        let numeric_name = ListingAttributes {
            toy_name: Some(json!(123)),
            ..Default::default()
        };
        assert!(!ListingFilter::NameContains(String::from("12")).matches(&numeric_name));
    }

    #[test]
    fn owner_filter_is_exact_and_optional() {
        let params = ListingParams {
            email: Some(String::from("seller@toys.com")),
            ..Default::default()
        };
        let filter = params.owner_filter();
        assert_eq!(filter.to_document(), doc! { "sellerEmail": "seller@toys.com" });

        let other = ListingAttributes {
            seller_email: Some(json!("Seller@toys.com")),
            ..Default::default()
        };
        assert!(!filter.matches(&other));

        assert_eq!(ListingParams::default().owner_filter(), ListingFilter::All);
    }
}
