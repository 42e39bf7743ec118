//! Role naming for the generated grants.

use super::identifiers::{normalize_ident, truncate_ident};

/// Base used when no schema name is available.
pub const DEFAULT_ROLE_BASE: &str = "APP";

/// Grantee used when no role users are supplied.
pub const DEFAULT_ROLE_USER: &str = "APP_USER";

pub const EDIT_ROLE_SUFFIX: &str = "_EDIT_ROLE";
pub const VIEW_ROLE_SUFFIX: &str = "_VIEW_ROLE";

/// Longest derived base; keeps `<BASE>_EDIT_ROLE` within 30 characters.
const MAX_ROLE_BASE_LENGTH: usize = 20;

/// Trailing schema segments naming a deployment environment.
const ENVIRONMENT_SEGMENTS: &[&str] = &["ENV", "DEV", "TEST", "QA", "UAT", "STG", "PROD"];

/// Derive the role base name from a target schema name.
///
/// - `mb_oracle_schema` -> `MB_ORACLE_SCHEMA`
/// - `mb_oracle_schema_env` -> `MB_ORACLE_SCHEMA`
/// - `NEXTHEACX_WIZAS` -> `HEACX`
/// - empty -> `APP`
pub fn derive_role_base(schema: Option<&str>) -> String {
    let upper = schema.unwrap_or_default().trim().to_uppercase();
    if upper.is_empty() {
        return DEFAULT_ROLE_BASE.to_string();
    }

    if let Some(rest) = upper.strip_prefix("NEXT") {
        if let Some((app, _module)) = rest.split_once('_') {
            if !app.is_empty() {
                return truncate_ident(app, MAX_ROLE_BASE_LENGTH);
            }
        }
    }

    let base = match upper.rsplit_once('_') {
        Some((head, tail)) if !head.is_empty() && ENVIRONMENT_SEGMENTS.contains(&tail) => head,
        _ => upper.as_str(),
    };

    truncate_ident(base, MAX_ROLE_BASE_LENGTH)
}

/// Edit and view role names used in the DCL section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNames {
    pub edit: String,
    pub view: String,
}

impl RoleNames {
    /// Explicit names win; missing ones are derived from the schema.
    pub fn resolve(schema: Option<&str>, edit: Option<&str>, view: Option<&str>) -> Self {
        let base = derive_role_base(schema);
        let pick = |explicit: Option<&str>, suffix: &str| match explicit.map(str::trim) {
            Some(name) if !name.is_empty() => normalize_ident(name),
            _ => format!("{}{}", base, suffix),
        };

        Self {
            edit: pick(edit, EDIT_ROLE_SUFFIX),
            view: pick(view, VIEW_ROLE_SUFFIX),
        }
    }
}

/// Grantees for a role, defaulting to the placeholder user.
pub fn role_users(users: &[String]) -> Vec<String> {
    let users: Vec<String> = users
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(normalize_ident)
        .collect();

    if users.is_empty() {
        vec![DEFAULT_ROLE_USER.to_string()]
    } else {
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_role_base_examples() {
        assert_eq!(derive_role_base(Some("mb_oracle_schema")), "MB_ORACLE_SCHEMA");
        assert_eq!(derive_role_base(Some("mb_oracle_schema_env")), "MB_ORACLE_SCHEMA");
        assert_eq!(derive_role_base(Some("NEXTHEACX_WIZAS")), "HEACX");
    }

    #[test]
    fn test_derive_role_base_defaults() {
        assert_eq!(derive_role_base(None), DEFAULT_ROLE_BASE);
        assert_eq!(derive_role_base(Some("   ")), DEFAULT_ROLE_BASE);
    }

    #[test]
    fn test_derive_role_base_environment_suffixes() {
        assert_eq!(derive_role_base(Some("billing_prod")), "BILLING");
        assert_eq!(derive_role_base(Some("billing_qa")), "BILLING");
        assert_eq!(derive_role_base(Some("billing")), "BILLING");
        assert_eq!(derive_role_base(Some("_dev")), "_DEV");
    }

    #[test]
    fn test_derive_role_base_keeps_role_names_short() {
        let base = derive_role_base(Some("a_rather_long_application_schema_name"));
        assert_eq!(base.len(), 20);
        assert!(format!("{}{}", base, EDIT_ROLE_SUFFIX).len() <= 30);
    }

    #[test]
    fn test_resolve_roles() {
        let derived = RoleNames::resolve(Some("mb_oracle_schema"), None, None);
        assert_eq!(derived.edit, "MB_ORACLE_SCHEMA_EDIT_ROLE");
        assert_eq!(derived.view, "MB_ORACLE_SCHEMA_VIEW_ROLE");

        let explicit = RoleNames::resolve(Some("x"), Some("writers"), Some(""));
        assert_eq!(explicit.edit, "WRITERS");
        assert_eq!(explicit.view, "X_VIEW_ROLE");
    }

    #[test]
    fn test_role_users_default() {
        assert_eq!(role_users(&[]), vec![DEFAULT_ROLE_USER]);
        assert_eq!(role_users(&[" ".to_string()]), vec![DEFAULT_ROLE_USER]);
        assert_eq!(
            role_users(&["alice".to_string(), "bob".to_string()]),
            vec!["ALICE", "BOB"]
        );
    }
}
