use std::{fmt, str::FromStr};

use mongodb::bson::{self, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("invalid listing id: {0}")]
pub struct InvalidIdError(pub String);

/// Store identity of a listing: the 12-byte object id, rendered as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingId(ObjectId);

impl ListingId {
    pub fn new() -> Self {
        ListingId(ObjectId::new())
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidIdError> {
        ObjectId::parse_str(raw)
            .map(ListingId)
            .map_err(|_| InvalidIdError(raw.to_string()))
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for ListingId {
    fn from(value: ObjectId) -> Self {
        ListingId(value)
    }
}

impl FromStr for ListingId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListingId::parse(s)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// Caller-supplied listing attributes. Nothing is validated: every field keeps whatever
/// JSON value it arrived as, and numeric fields only get a best-effort coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingAttributes {
    #[serde(rename = "toyName", default, skip_serializing_if = "Option::is_none")]
    pub toy_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<Value>,
    #[serde(rename = "sellerName", default, skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<Value>,
    #[serde(rename = "sellerEmail", default, skip_serializing_if = "Option::is_none")]
    pub seller_email: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Value>,
    #[serde(
        default,
        deserialize_with = "coerce::numeric",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Value>,
    #[serde(
        rename = "Rating",
        alias = "rating",
        default,
        deserialize_with = "coerce::numeric",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<Value>,
    #[serde(
        default,
        deserialize_with = "coerce::numeric",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Value>,
    /// Anything else the client sent; stored as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListingAttributes {
    /// Drops a client-supplied `_id` so it can never shadow the store identity.
    pub fn without_identity(mut self) -> Self {
        self.extra.remove("_id");
        self
    }

    /// Fills `sellerEmail` from the authenticated caller when the body left it out.
    pub fn with_default_seller(mut self, email: Option<&str>) -> Self {
        if self.seller_email.is_none() {
            self.seller_email = email.map(Value::from);
        }
        self
    }

    /// The thirteen listing fields under their store names.
    pub fn fields(&self) -> [(&'static str, Option<&Value>); 13] {
        [
            ("toyName", self.toy_name.as_ref()),
            ("img", self.img.as_ref()),
            ("sellerName", self.seller_name.as_ref()),
            ("sellerEmail", self.seller_email.as_ref()),
            ("category", self.category.as_ref()),
            ("price", self.price.as_ref()),
            ("Rating", self.rating.as_ref()),
            ("quantity", self.quantity.as_ref()),
            ("description", self.description.as_ref()),
            ("brand", self.brand.as_ref()),
            ("color", self.color.as_ref()),
            ("weight", self.weight.as_ref()),
            ("material", self.material.as_ref()),
        ]
    }

    /// The `$set` body of a full replace: every listing field, absent ones as null.
    pub fn replacement_document(&self) -> Result<Document, bson::ser::Error> {
        let mut set = Document::new();
        for (field, value) in self.fields() {
            set.insert(field, bson::to_bson(&value)?);
        }
        Ok(set)
    }

    /// Applies a full replace in place, leaving extra fields untouched.
    pub fn replace_fields(&mut self, from: ListingAttributes) {
        let extra = std::mem::take(&mut self.extra);
        *self = ListingAttributes { extra, ..from };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(flatten)]
    pub attributes: ListingAttributes,
}

impl Listing {
    pub fn listing_id(&self) -> ListingId {
        ListingId::from(self.id)
    }
}

mod coerce {
    use serde::{Deserialize, Deserializer};
    use serde_json::{Number, Value};

    /// Numeric strings become numbers and blank strings become absent.
    /// Anything that does not convert is kept exactly as it arrived.
    pub fn numeric<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?.and_then(number_from))
    }

    fn number_from(value: Value) -> Option<Value> {
        let text = match value {
            Value::Null => return None,
            Value::String(text) => text,
            other => return Some(other),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(whole) = trimmed.parse::<i64>() {
            return Some(Value::from(whole));
        }

        let parsed = trimmed.parse::<f64>().ok().and_then(Number::from_f64);
        match parsed {
            Some(number) => Some(Value::Number(number)),
            None => Some(Value::String(text)),
        }
    }
}
