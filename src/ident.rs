//! Identifier & casing utilities (C1)
//!
//! Converts between host-language camelCase identifiers and the
//! snake_case names used in storage, and quotes identifiers for inclusion
//! in rendered DDL/DML.

use convert_case::{Case, Casing};

/// Converts a host identifier (`fullName`) to its storage form
/// (`full_name`).
pub fn to_db_name(host_name: &str) -> String {
    host_name.to_case(Case::Snake)
}

/// Converts a storage identifier (`full_name`) back to host casing
/// (`fullName`).
pub fn to_host_name(db_name: &str) -> String {
    db_name.to_case(Case::Camel)
}

/// Quotes an identifier for use in rendered SQL, doubling any embedded
/// double quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the canonical name for an index with no explicit name:
/// `"<table>_<col1>_<col2>..._idx"`.
pub fn canonical_index_name(table_db_name: &str, columns: &[String]) -> String {
    let mut parts = vec![table_db_name.to_string()];
    parts.extend(columns.iter().cloned());
    parts.push("idx".to_string());
    parts.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_camel_to_snake() {
        assert_eq!(to_db_name("fullName"), "full_name");
        assert_eq!(to_db_name("id"), "id");
        assert_eq!(to_db_name("createdAt"), "created_at");
    }

    #[test]
    fn converts_snake_to_camel() {
        assert_eq!(to_host_name("full_name"), "fullName");
        assert_eq!(to_host_name("id"), "id");
    }

    #[test]
    fn quotes_and_escapes_identifiers() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn builds_canonical_index_name() {
        assert_eq!(
            canonical_index_name("users", &["email".to_string()]),
            "users_email_idx"
        );
        assert_eq!(
            canonical_index_name(
                "users",
                &["first_name".to_string(), "last_name".to_string()]
            ),
            "users_first_name_last_name_idx"
        );
    }
}
