//! `mysqli_fetch_field`-shaped result column descriptions.

use serde::Serialize;

use super::session::ResultColumn;
use crate::metadata::{ColumnDescriptor, ColumnType, FieldFlags};

/// Description of one result column, with key attributes taken from the
/// table metadata cache when the column's table is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,

    /// Source table, empty for computed columns
    pub table: String,

    pub not_null: bool,
    pub primary_key: bool,
    pub multiple_key: bool,
    pub unique_key: bool,
    pub numeric: bool,
    pub blob: bool,
    pub unsigned: bool,
    pub zerofill: bool,

    #[serde(rename = "type")]
    pub type_name: String,

    /// Declared length, 0 if unknown
    pub length: u32,

    /// `FieldFlags` bits
    pub flags: u32,
}

impl FieldInfo {
    /// Combine a driver-reported column with its cached descriptor, if any.
    ///
    /// Without a descriptor the column is reported as NOT NULL, matching what
    /// mysqli clients have always observed for computed columns.
    #[must_use]
    pub fn new(column: &ResultColumn, descriptor: Option<&ColumnDescriptor>) -> Self {
        let table = column.table.clone().unwrap_or_default();

        match descriptor {
            Some(desc) => Self {
                name: column.name.clone(),
                table,
                not_null: desc.is_not_null(),
                primary_key: desc.is_primary_key(),
                multiple_key: desc.is_index() && !desc.is_primary_key(),
                unique_key: desc.is_unique() && !desc.is_primary_key(),
                numeric: desc.is_numeric(),
                blob: desc.is_blob(),
                unsigned: desc.is_unsigned(),
                zerofill: desc.is_zero_fill(),
                type_name: desc.type_name().to_string(),
                length: desc.length(),
                flags: FieldFlags::from_column(desc).bits(),
            },
            None => {
                let type_name = column.type_name.clone().unwrap_or_else(|| "unknown".to_string());
                let ty = ColumnType::from_type_name(&type_name);

                let mut flags = FieldFlags::NOT_NULL;
                if ty.is_numeric() {
                    flags |= FieldFlags::NUM;
                }
                if ty.is_blob() {
                    flags |= FieldFlags::BLOB;
                }

                Self {
                    name: column.name.clone(),
                    table,
                    not_null: true,
                    primary_key: false,
                    multiple_key: false,
                    unique_key: false,
                    numeric: ty.is_numeric(),
                    blob: ty.is_blob(),
                    unsigned: false,
                    zerofill: false,
                    type_name,
                    length: 0,
                    flags,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ColumnBuilder;

    #[test]
    fn test_without_metadata_defaults_to_not_null() {
        let info = FieldInfo::new(&ResultColumn::named("total"), None);
        assert!(info.not_null);
        assert!(!info.primary_key);
        assert_eq!(info.table, "");
        assert_eq!(info.type_name, "unknown");
        assert_eq!(info.flags, FieldFlags::NOT_NULL);
    }

    #[test]
    fn test_without_metadata_uses_driver_type() {
        let column = ResultColumn::named("n").with_type_name("int8");
        let info = FieldInfo::new(&column, None);
        assert!(info.numeric);
        assert_eq!(info.flags, FieldFlags::NOT_NULL | FieldFlags::NUM);
    }

    #[test]
    fn test_descriptor_overlay() {
        let mut builder =
            ColumnBuilder::new("users", "email", ColumnType::VarChar, "varchar(128)", 128, true);
        builder.mark_index(true);
        let desc = builder.build();

        let column = ResultColumn::named("email").from_table(None, "users");
        let info = FieldInfo::new(&column, Some(&desc));

        assert_eq!(info.table, "users");
        assert!(!info.not_null);
        assert!(info.multiple_key);
        assert!(info.unique_key);
        assert!(!info.numeric);
        assert_eq!(info.type_name, "varchar(128)");
        assert_eq!(info.length, 128);
        assert_eq!(info.flags, FieldFlags::from_column(&desc).bits());
    }

    #[test]
    fn test_primary_key_is_not_multiple_key() {
        let mut builder =
            ColumnBuilder::new("users", "id", ColumnType::Integer, "int(10) unsigned", 10, false);
        builder.mark_primary_key().mark_index(true);
        let desc = builder.build();

        let info = FieldInfo::new(&ResultColumn::named("id"), Some(&desc));
        assert!(info.primary_key);
        assert!(!info.multiple_key);
        assert!(!info.unique_key);
        assert!(info.unsigned);
        assert!(info.numeric);
    }
}
