//! Column descriptors and vendor-neutral type codes.

use serde::Serialize;

/// Vendor-neutral column type, numbered like `java.sql.Types`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bit,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Char,
    VarChar,
    LongVarChar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Blob,
    Clob,
    Boolean,
    Other,
}

impl ColumnType {
    /// JDBC-compatible integer code
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Bit => -7,
            Self::TinyInt => -6,
            Self::SmallInt => 5,
            Self::Integer => 4,
            Self::BigInt => -5,
            Self::Float => 6,
            Self::Real => 7,
            Self::Double => 8,
            Self::Numeric => 2,
            Self::Decimal => 3,
            Self::Char => 1,
            Self::VarChar => 12,
            Self::LongVarChar => -1,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::Binary => -2,
            Self::VarBinary => -3,
            Self::LongVarBinary => -4,
            Self::Blob => 2004,
            Self::Clob => 2005,
            Self::Boolean => 16,
            Self::Other => 1111,
        }
    }

    /// Map a catalog type name (any of the supported engines) to a type code.
    ///
    /// Modifiers such as `(11)`, `unsigned` or `without time zone` are ignored.
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Self {
        let lower = type_name.trim().to_ascii_lowercase();
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "bit" => Self::Bit,
            "tinyint" => Self::TinyInt,
            "smallint" | "int2" | "smallserial" | "year" => Self::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" => Self::Integer,
            "bigint" | "int8" | "bigserial" => Self::BigInt,
            "float" => Self::Float,
            "real" | "float4" => Self::Real,
            "double" | "float8" => Self::Double,
            "numeric" => Self::Numeric,
            "decimal" | "money" => Self::Decimal,
            "char" | "character" | "bpchar" | "nchar" | "enum" | "set" => {
                if lower.contains("varying") {
                    Self::VarChar
                } else {
                    Self::Char
                }
            }
            "varchar" | "nvarchar" | "name" | "uuid" | "json" | "jsonb" => Self::VarChar,
            "text" | "tinytext" | "mediumtext" | "longtext" | "clob" => {
                if base == "clob" {
                    Self::Clob
                } else {
                    Self::LongVarChar
                }
            }
            "date" => Self::Date,
            "time" | "timetz" => Self::Time,
            "timestamp" | "timestamptz" | "datetime" => Self::Timestamp,
            "binary" => Self::Binary,
            "varbinary" => Self::VarBinary,
            "bytea" | "tinyblob" | "mediumblob" | "longblob" => Self::LongVarBinary,
            "blob" => Self::Blob,
            "bool" | "boolean" => Self::Boolean,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Bit
                | Self::TinyInt
                | Self::SmallInt
                | Self::Integer
                | Self::BigInt
                | Self::Float
                | Self::Real
                | Self::Double
                | Self::Numeric
                | Self::Decimal
                | Self::Boolean
        )
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Real | Self::Double)
    }

    #[must_use]
    pub const fn is_blob(self) -> bool {
        matches!(
            self,
            Self::LongVarChar
                | Self::LongVarBinary
                | Self::Blob
                | Self::Clob
                | Self::Binary
                | Self::VarBinary
        )
    }

    #[must_use]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::Char | Self::VarChar | Self::LongVarChar | Self::Clob)
    }
}

/// Static attributes of one column, as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    table: String,
    name: String,
    column_type: ColumnType,
    type_name: String,
    length: u32,
    not_null: bool,
    unsigned: bool,
    zero_fill: bool,
    primary_key: bool,
    index: bool,
    unique: bool,
}

impl ColumnDescriptor {
    /// Name of the owning table
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Catalog type name, e.g. `int(10) unsigned`
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared length
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    #[must_use]
    pub const fn is_not_null(&self) -> bool {
        self.not_null
    }

    #[must_use]
    pub const fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    #[must_use]
    pub const fn is_zero_fill(&self) -> bool {
        self.zero_fill
    }

    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    #[must_use]
    pub const fn is_index(&self) -> bool {
        self.index
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        self.column_type.is_numeric()
    }

    #[must_use]
    pub const fn is_blob(&self) -> bool {
        self.column_type.is_blob()
    }
}

/// Two-phase construction of a `ColumnDescriptor`.
///
/// The base attributes come from the column listing; the key flags are
/// overlaid afterwards from the primary-key and index listings.
#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    descriptor: ColumnDescriptor,
}

impl ColumnBuilder {
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        column_type: ColumnType,
        type_name: impl Into<String>,
        length: u32,
        nullable: bool,
    ) -> Self {
        let type_name = type_name.into();
        let lower = type_name.to_ascii_lowercase();

        Self {
            descriptor: ColumnDescriptor {
                table: table.into(),
                name: name.into(),
                column_type,
                unsigned: lower.contains("unsigned"),
                zero_fill: lower.contains("zerofill"),
                type_name,
                length,
                not_null: !nullable,
                primary_key: false,
                index: false,
                unique: false,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn mark_primary_key(&mut self) -> &mut Self {
        self.descriptor.primary_key = true;
        self
    }

    pub fn mark_index(&mut self, unique: bool) -> &mut Self {
        self.descriptor.index = true;
        self.descriptor.unique |= unique;
        self
    }

    #[must_use]
    pub fn build(self) -> ColumnDescriptor {
        self.descriptor
    }
}

/// MySQL field flag bitmask, as reported by `mysqli_fetch_field`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FieldFlags(u32);

impl FieldFlags {
    pub const NOT_NULL: u32 = 0x1;
    pub const PRI_KEY: u32 = 0x2;
    pub const UNIQUE_KEY: u32 = 0x4;
    pub const MULTIPLE_KEY: u32 = 0x8;
    pub const BLOB: u32 = 0x10;
    pub const UNSIGNED: u32 = 0x20;
    pub const ZEROFILL: u32 = 0x40;
    pub const BINARY: u32 = 0x80;
    pub const PART_KEY: u32 = 0x4000;
    pub const NUM: u32 = 0x8000;

    #[must_use]
    pub fn from_column(column: &ColumnDescriptor) -> Self {
        let mut bits = 0;
        let ty = column.column_type();

        if column.is_not_null() {
            bits |= Self::NOT_NULL;
        }
        if column.is_primary_key() {
            bits |= Self::PRI_KEY | Self::PART_KEY;
        } else if column.is_index() {
            bits |= Self::MULTIPLE_KEY | Self::PART_KEY;
        }
        if column.is_unique() && !column.is_primary_key() {
            bits |= Self::UNIQUE_KEY;
        }
        if ty.is_blob() {
            bits |= Self::BLOB;
        }
        if column.is_unsigned() {
            bits |= Self::UNSIGNED;
        }
        if column.is_zero_fill() {
            bits |= Self::ZEROFILL;
        }
        if matches!(
            ty,
            ColumnType::LongVarBinary | ColumnType::Date | ColumnType::Timestamp
        ) {
            bits |= Self::BINARY;
        }
        if ty.is_numeric() {
            bits |= Self::NUM;
        }

        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}
