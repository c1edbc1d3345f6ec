//! Stable identities of users and roles.
//!
//! Every principal is identified by the database it lives in and its name.
//! The composite form `<database>.<name>` is used as the computed `id`
//! attribute and as the handle operators pass when importing an existing
//! principal.
use std::{fmt::Display, str::FromStr};

use snafu::{ResultExt, Snafu, ensure};

/// Separates the database from the name in the composite form.
pub const SEPARATOR: char = '.';

/// The kind of principal an identity belongs to. Only used to produce
/// meaningful error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Role,
}

/// The error type for parsing the composite `<database>.<name>` form.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseIdentityError {
    #[snafu(display("missing dot separator between database and name"))]
    MissingSeparator,

    #[snafu(display("missing database before the dot separator"))]
    EmptyDatabase,

    #[snafu(display("missing name after the dot separator"))]
    EmptyName,
}

/// The error type for [`PrincipalIdentity::resolve`].
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum IdentityError {
    /// Neither the name and database attributes nor an importable ID were
    /// supplied.
    #[snafu(display("missing {kind} ID"))]
    MissingIdentity { kind: PrincipalKind },

    /// The ID was supplied but could not be split into database and name.
    #[snafu(display("malformed {kind} ID {id:?}"))]
    MalformedIdentity {
        kind: PrincipalKind,
        id: String,
        source: ParseIdentityError,
    },
}

/// Read access to the attributes an identity can be resolved from.
///
/// Implemented by the declarative state of users and roles. The name and
/// database are set when the caller declared the principal, the ID alone is
/// set when the principal is being imported.
pub trait Identified {
    const KIND: PrincipalKind;

    fn name(&self) -> Option<&str>;
    fn database(&self) -> Option<&str>;
    fn id(&self) -> Option<&str>;
}

/// The identity of a user or role: its name and the database it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrincipalIdentity {
    pub name: String,
    pub database: String,
}

impl PrincipalIdentity {
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
        }
    }

    /// Resolves the working identity of `model`.
    ///
    /// The structured `name` and `database` attributes take precedence when
    /// both are set and non-empty. Otherwise the identity is parsed out of the
    /// `id` attribute, which is the only attribute known during an import.
    pub fn resolve<M: Identified + ?Sized>(model: &M) -> Result<Self, IdentityError> {
        if let (Some(name), Some(database)) = (model.name(), model.database())
            && !name.is_empty()
            && !database.is_empty()
        {
            return Ok(Self::new(name, database));
        }

        let kind = M::KIND;
        let id = match model.id() {
            Some(id) if !id.is_empty() => id,
            _ => return MissingIdentitySnafu { kind }.fail(),
        };

        id.parse().context(MalformedIdentitySnafu { kind, id })
    }
}

impl FromStr for PrincipalIdentity {
    type Err = ParseIdentityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (database, name) = input
            .split_once(SEPARATOR)
            .ok_or(ParseIdentityError::MissingSeparator)?;

        ensure!(!database.is_empty(), EmptyDatabaseSnafu);
        ensure!(!name.is_empty(), EmptyNameSnafu);

        Ok(Self::new(name, database))
    }
}

impl Display for PrincipalIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.database, self.name)
    }
}

/// Formats the composite ID of the principal `name` in `database`.
pub fn format_id(name: &str, database: &str) -> String {
    format!("{database}{SEPARATOR}{name}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Model {
        name: Option<String>,
        database: Option<String>,
        id: Option<String>,
    }

    impl Identified for Model {
        const KIND: PrincipalKind = PrincipalKind::User;

        fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        fn database(&self) -> Option<&str> {
            self.database.as_deref()
        }

        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }
    }

    fn model(name: Option<&str>, database: Option<&str>, id: Option<&str>) -> Model {
        Model {
            name: name.map(Into::into),
            database: database.map(Into::into),
            id: id.map(Into::into),
        }
    }

    #[rstest]
    #[case("alice", "sales")]
    #[case("my-user", "admin")]
    #[case("a", "b")]
    #[case("user@example.com", "$external")]
    fn round_trip(#[case] name: &str, #[case] database: &str) {
        let id = format_id(name, database);
        let resolved = PrincipalIdentity::resolve(&model(None, None, Some(&id))).unwrap();

        assert_eq!(resolved, PrincipalIdentity::new(name, database));
        assert_eq!(resolved.to_string(), id);
    }

    #[test]
    fn attributes_take_precedence_over_id() {
        let resolved = PrincipalIdentity::resolve(&model(
            Some("has.dot"),
            Some("sales"),
            Some("other.bob"),
        ))
        .unwrap();

        assert_eq!(resolved, PrincipalIdentity::new("has.dot", "sales"));
    }

    #[rstest]
    #[case(Some(""), Some("sales"))]
    #[case(Some("alice"), Some(""))]
    #[case(Some("alice"), None)]
    #[case(None, Some("sales"))]
    fn incomplete_attributes_fall_back_to_id(
        #[case] name: Option<&str>,
        #[case] database: Option<&str>,
    ) {
        let resolved =
            PrincipalIdentity::resolve(&model(name, database, Some("admin.root"))).unwrap();

        assert_eq!(resolved, PrincipalIdentity::new("root", "admin"));
    }

    #[test]
    fn id_splits_at_first_separator() {
        let identity: PrincipalIdentity = "sales.alice.smith".parse().unwrap();

        assert_eq!(identity.database, "sales");
        assert_eq!(identity.name, "alice.smith");
    }

    #[rstest]
    #[case("salesalice", ParseIdentityError::MissingSeparator)]
    #[case(".alice", ParseIdentityError::EmptyDatabase)]
    #[case("sales.", ParseIdentityError::EmptyName)]
    #[case(".", ParseIdentityError::EmptyDatabase)]
    fn malformed_id(#[case] id: &str, #[case] problem: ParseIdentityError) {
        let err = PrincipalIdentity::resolve(&model(None, None, Some(id))).unwrap_err();

        assert_eq!(
            err,
            IdentityError::MalformedIdentity {
                kind: PrincipalKind::User,
                id: id.to_owned(),
                source: problem,
            }
        );
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    fn missing_id(#[case] id: Option<&str>) {
        let err = PrincipalIdentity::resolve(&model(None, None, id)).unwrap_err();

        assert_eq!(
            err,
            IdentityError::MissingIdentity {
                kind: PrincipalKind::User
            }
        );
        assert_eq!(err.to_string(), "missing user ID");
    }
}
