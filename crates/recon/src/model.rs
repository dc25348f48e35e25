use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single field value as seen by the engine.
///
/// `Absent` means "unknown" and is distinct from zero, false or empty text.
/// `Int` and `Real` are both numeric and compare with each other.
/// Serializes as the bare JSON scalar, `Absent` as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Absent,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Real(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Name of the underlying type, used in conflict diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Int(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }

    /// Compare two numeric values. `None` when either side is not numeric
    /// or the comparison is undefined.
    pub fn numeric_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "<absent>"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Absent)
    }
}

/// Flat field mapping produced by a source adapter. No ordering guarantee
/// is implied by the source; the map is ordered only for determinism.
pub type RawFields = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Listing,
    Profile,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Listing => "listings",
            Self::Profile => "profiles",
        }
    }

    pub fn identity_field(&self) -> &'static str {
        match self {
            Self::Listing => "listing_id",
            Self::Profile => "profile_id",
        }
    }

    /// Alternative header names accepted for the identity field.
    pub fn identity_aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Listing => &["auction_id", "item_id"],
            Self::Profile => &["seller_id", "nickname"],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listing => write!(f, "listing"),
            Self::Profile => write!(f, "profile"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A partial entity record.
///
/// A field can be missing (no key at all) or present with [`Value::Absent`].
/// Both read as absent through [`Record::value`]; only [`Record::get`]
/// tells them apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: EntityKind,
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn from_fields(kind: EntityKind, fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            kind,
            fields: fields.into_iter().collect(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn value(&self, field: &str) -> &Value {
        static ABSENT: Value = Value::Absent;
        self.fields.get(field).unwrap_or(&ABSENT)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// The identity value, if present.
    pub fn identity(&self) -> Option<&Value> {
        self.fields
            .get(self.kind.identity_field())
            .filter(|v| !v.is_absent())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Source adapter output
// ---------------------------------------------------------------------------

/// One observation of an entity from one fetch or import.
#[derive(Debug, Clone)]
pub struct Observation {
    pub kind: EntityKind,
    pub fields: RawFields,
    /// Remote images referenced by the observation, not yet downloaded.
    pub image_urls: Vec<String>,
    /// Where the observation came from (file and line, URL, ...).
    pub origin: String,
}

impl Observation {
    pub fn new(kind: EntityKind, origin: impl Into<String>) -> Self {
        Self {
            kind,
            fields: RawFields::new(),
            image_urls: Vec::new(),
            origin: origin.into(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn identity(&self) -> Option<&Value> {
        self.fields
            .get(self.kind.identity_field())
            .filter(|v| !v.is_absent())
    }
}
