use crate::coerce::Conversion;
use crate::error::MergeError;
use crate::model::{EntityKind, Record, Value};

/// Column holding a colon-delimited list of relative image paths.
pub const IMAGE_PATHS_FIELD: &str = "image_paths";

// ---------------------------------------------------------------------------
// Declared fields
// ---------------------------------------------------------------------------

/// Default written into a NOT NULL column when the merged record has no value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    Int(i64),
    Text(&'static str),
}

impl FieldDefault {
    pub fn to_value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Text(s) => Value::text(s),
        }
    }
}

/// A field as declared by this crate for one entity kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub conversion: Conversion,
    pub sql_type: &'static str,
    pub not_null: bool,
    pub primary_key: bool,
    pub default: Option<FieldDefault>,
}

const fn field(name: &'static str, conversion: Conversion, sql_type: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        conversion,
        sql_type,
        not_null: false,
        primary_key: false,
        default: None,
    }
}

const fn identity(name: &'static str, conversion: Conversion, sql_type: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        conversion,
        sql_type,
        not_null: true,
        primary_key: true,
        default: None,
    }
}

const fn required(
    name: &'static str,
    conversion: Conversion,
    sql_type: &'static str,
    default: FieldDefault,
) -> FieldSpec {
    FieldSpec {
        name,
        conversion,
        sql_type,
        not_null: true,
        primary_key: false,
        default: Some(default),
    }
}

pub const LISTING_FIELDS: &[FieldSpec] = &[
    identity("listing_id", Conversion::Integer, "INTEGER"),
    field("title", Conversion::Text, "TEXT"),
    field("seller", Conversion::Text, "TEXT"),
    field("start_time", Conversion::UnixTime, "INTEGER"),
    field("end_time", Conversion::UnixTime, "INTEGER"),
    field("n_bids", Conversion::Integer, "INTEGER"),
    field("price", Conversion::Real, "REAL"),
    field("currency_code", Conversion::Text, "TEXT"),
    field("buy_now_price", Conversion::Real, "REAL"),
    field("starting_price", Conversion::Real, "REAL"),
    field("winner", Conversion::Text, "TEXT"),
    field("location_id", Conversion::Text, "TEXT"),
    required(IMAGE_PATHS_FIELD, Conversion::Text, "TEXT", FieldDefault::Text("")),
    field("description", Conversion::Text, "TEXT"),
];

pub const PROFILE_FIELDS: &[FieldSpec] = &[
    identity("profile_id", Conversion::Text, "TEXT"),
    field("description", Conversion::Text, "TEXT"),
    required("contacted", Conversion::Flag, "INTEGER", FieldDefault::Int(0)),
    field("email", Conversion::Text, "TEXT"),
    field("location", Conversion::Text, "TEXT"),
    field("name", Conversion::Text, "TEXT"),
    field("registered", Conversion::Flag, "INTEGER"),
    required("permission_given", Conversion::Flag, "INTEGER", FieldDefault::Int(0)),
    field("member_since", Conversion::Text, "TEXT"),
    field("member_since_unix", Conversion::UnixTime, "INTEGER"),
    field("n_followers", Conversion::Integer, "INTEGER"),
    field("n_reviews", Conversion::Integer, "INTEGER"),
    field("percent_positive_feedback", Conversion::Real, "REAL"),
];

impl EntityKind {
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Self::Listing => LISTING_FIELDS,
            Self::Profile => PROFILE_FIELDS,
        }
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the declared fields.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .fields()
            .iter()
            .map(|f| {
                let mut col = format!("    {} {}", f.name, f.sql_type);
                if f.not_null {
                    col.push_str(" NOT NULL");
                }
                if f.primary_key {
                    col.push_str(" PRIMARY KEY");
                }
                match f.default {
                    Some(FieldDefault::Int(i)) => col.push_str(&format!(" DEFAULT {i}")),
                    Some(FieldDefault::Text(s)) => {
                        col.push_str(&format!(" DEFAULT '{}'", s.replace('\'', "''")))
                    }
                    None => {}
                }
                col
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.table(),
            columns.join(",\n")
        )
    }
}

// ---------------------------------------------------------------------------
// Live schema
// ---------------------------------------------------------------------------

/// One column of a table as it exists in the store right now.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub conversion: Conversion,
    pub not_null: bool,
    pub primary_key: bool,
    pub default: Option<Value>,
}

impl Column {
    /// Build a column from introspected metadata. Declared fields keep their
    /// declared conversion; unknown columns fall back to SQL type affinity.
    pub fn introspected(
        kind: EntityKind,
        name: &str,
        decl_type: &str,
        not_null: bool,
        primary_key: bool,
        sql_default: Option<&str>,
    ) -> Self {
        let declared = kind.field(name);
        let conversion = declared
            .map(|f| f.conversion)
            .unwrap_or_else(|| Conversion::from_affinity(decl_type));
        let default = declared
            .and_then(|f| f.default)
            .map(FieldDefault::to_value)
            .or_else(|| sql_default.and_then(parse_sql_literal));
        Self {
            name: name.to_string(),
            conversion,
            not_null,
            primary_key,
            default,
        }
    }

    pub fn is_path_list(&self) -> bool {
        self.name == IMAGE_PATHS_FIELD
    }
}

/// Parse the literal SQLite reports as a column default.
fn parse_sql_literal(literal: &str) -> Option<Value> {
    let literal = literal.trim();
    if literal.eq_ignore_ascii_case("null") {
        return None;
    }
    if let Some(inner) = literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Some(Value::text(inner.replace("''", "'")));
    }
    if let Ok(i) = literal.parse::<i64>() {
        return Some(Value::Int(i));
    }
    literal.parse::<f64>().ok().map(Value::Real)
}

/// The live column set of one entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    kind: EntityKind,
    columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(kind: EntityKind, columns: Vec<Column>) -> Self {
        Self { kind, columns }
    }

    /// Schema exactly as declared by [`EntityKind::fields`].
    pub fn declared(kind: EntityKind) -> Self {
        let columns = kind
            .fields()
            .iter()
            .map(|f| Column {
                name: f.name.to_string(),
                conversion: f.conversion,
                not_null: f.not_null,
                primary_key: f.primary_key,
                default: f.default.map(FieldDefault::to_value),
            })
            .collect();
        Self { kind, columns }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn table(&self) -> &'static str {
        self.kind.table()
    }

    pub fn identity_field(&self) -> &'static str {
        self.kind.identity_field()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Fill absent NOT NULL columns with their defaults.
    ///
    /// Fails when the identity is absent or a required column has no default.
    pub fn fill_defaults(&self, record: &mut Record) -> Result<(), MergeError> {
        if record.identity().is_none() {
            return Err(MergeError::MissingIdentity { kind: self.kind });
        }
        for column in &self.columns {
            if !column.not_null || !record.value(&column.name).is_absent() {
                continue;
            }
            match &column.default {
                Some(default) => record.set(&column.name, default.clone()),
                None => {
                    return Err(MergeError::MissingRequired {
                        table: self.table(),
                        field: column.name.clone(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_table_sql_declares_constraints() {
        let sql = EntityKind::Profile.create_table_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS profiles"));
        assert!(sql.contains("profile_id TEXT NOT NULL PRIMARY KEY"));
        assert!(sql.contains("contacted INTEGER NOT NULL DEFAULT 0"));
        let sql = EntityKind::Listing.create_table_sql();
        assert!(sql.contains("image_paths TEXT NOT NULL DEFAULT ''"));
    }

    #[test]
    fn introspected_unknown_column_uses_affinity() {
        let col = Column::introspected(EntityKind::Listing, "watchers", "INT", false, false, None);
        assert_eq!(col.conversion, Conversion::Integer);
        let col = Column::introspected(EntityKind::Listing, "notes", "VARCHAR(20)", true, false, Some("'n/a'"));
        assert_eq!(col.conversion, Conversion::Text);
        assert_eq!(col.default, Some(Value::text("n/a")));
    }

    #[test]
    fn introspected_declared_column_keeps_declared_conversion() {
        let col = Column::introspected(EntityKind::Profile, "contacted", "INTEGER", true, false, None);
        assert_eq!(col.conversion, Conversion::Flag);
        assert_eq!(col.default, Some(Value::Int(0)));
    }

    #[test]
    fn fill_defaults_sets_required_columns() {
        let schema = TableSchema::declared(EntityKind::Profile);
        let mut record = Record::new(EntityKind::Profile).with("profile_id", "alice");
        schema.fill_defaults(&mut record).unwrap();
        assert_eq!(record.value("contacted"), &Value::Int(0));
        assert_eq!(record.value("permission_given"), &Value::Int(0));
        assert!(record.value("email").is_absent());
    }

    #[test]
    fn fill_defaults_without_default_fails() {
        let mut columns = TableSchema::declared(EntityKind::Listing).columns().to_vec();
        columns.push(Column {
            name: "region".into(),
            conversion: Conversion::Text,
            not_null: true,
            primary_key: false,
            default: None,
        });
        let schema = TableSchema::new(EntityKind::Listing, columns);
        let mut record = Record::new(EntityKind::Listing).with("listing_id", 7);
        let err = schema.fill_defaults(&mut record).unwrap_err();
        assert!(matches!(err, MergeError::MissingRequired { ref field, .. } if field == "region"));
    }

    #[test]
    fn fill_defaults_requires_identity() {
        let schema = TableSchema::declared(EntityKind::Listing);
        let mut record = Record::new(EntityKind::Listing).with("title", "x");
        assert!(matches!(
            schema.fill_defaults(&mut record),
            Err(MergeError::MissingIdentity { kind: EntityKind::Listing })
        ));
    }
}
