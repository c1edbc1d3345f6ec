//! Folding freshly fetched principals back into declarative state.
//!
//! Optional collection attributes are only refreshed when the caller declared
//! them. An attribute that was never declared stays unset, so that values the
//! database fills in by default never show up as a difference to the
//! configuration. An attribute declared as an empty collection is refreshed
//! like any other.
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    privilege::{PrivilegeDocument, PrivilegeState},
    resource::DecodeResourceError,
    role_ref::{RoleDbRef, RoleRefState},
};

#[derive(Debug, Snafu)]
pub enum MergeError {
    #[snafu(display(
        "{declared} role references are declared, but the database reported {fetched}"
    ))]
    RoleReferenceCountMismatch { declared: usize, fetched: usize },

    #[snafu(display(
        "role reference #{index} is declared as {declared:?}, but the database reported {fetched:?}"
    ))]
    RoleReferenceMismatch {
        index: usize,
        declared: String,
        fetched: String,
    },

    #[snafu(display("failed to decode the resource of privilege #{index}"))]
    DecodePrivilege {
        index: usize,
        source: DecodeResourceError,
    },
}

/// A declarative state that can be refreshed from a principal fetched from
/// the database.
pub trait ApplyFetched<T> {
    /// Refreshes `self` from `fetched`.
    ///
    /// On error `self` may be partially updated and must be discarded.
    fn apply_fetched(&mut self, fetched: &T) -> Result<(), MergeError>;
}

/// Replaces the value of `field` by `refresh(prior)`, but only if `field` is
/// set.
pub fn refresh_if_declared<T, E>(
    field: &mut Option<T>,
    refresh: impl FnOnce(&T) -> Result<T, E>,
) -> Result<(), E> {
    if let Some(prior) = field.as_ref() {
        let refreshed = refresh(prior)?;
        *field = Some(refreshed);
    }
    Ok(())
}

/// Refreshes declared role references from the fetched ones.
///
/// Both lists are aligned by position and must name the same roles. A
/// reference declared without a database keeps its database unset, even
/// though the database always reports it explicitly.
pub fn merge_role_refs(
    declared: &[RoleRefState],
    fetched: &[RoleDbRef],
) -> Result<Vec<RoleRefState>, MergeError> {
    ensure!(
        declared.len() == fetched.len(),
        RoleReferenceCountMismatchSnafu {
            declared: declared.len(),
            fetched: fetched.len(),
        }
    );

    declared
        .iter()
        .zip(fetched)
        .enumerate()
        .map(|(index, (prior, fetched))| {
            ensure!(
                prior.role == fetched.role,
                RoleReferenceMismatchSnafu {
                    index,
                    declared: &prior.role,
                    fetched: &fetched.role,
                }
            );
            Ok(RoleRefState {
                role: fetched.role.clone(),
                db: prior.db.as_ref().map(|_| fetched.db.clone()),
            })
        })
        .collect()
}

/// Decodes privileges reported by the database into their declarative form.
pub fn decode_privileges(fetched: &[PrivilegeDocument]) -> Result<Vec<PrivilegeState>, MergeError> {
    fetched
        .iter()
        .enumerate()
        .map(|(index, document)| {
            let privilege = document.decode().context(DecodePrivilegeSnafu { index })?;
            Ok(PrivilegeState::from(&privilege))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use serde_json::json;

    use super::*;

    fn fetched(role: &str, db: &str) -> RoleDbRef {
        RoleDbRef {
            role: role.into(),
            db: db.into(),
        }
    }

    #[test]
    fn implicit_database_stays_unset() {
        let merged = merge_role_refs(
            &[RoleRefState::same_database("readWrite")],
            &[fetched("readWrite", "mydb")],
        )
        .unwrap();

        assert_eq!(merged, vec![RoleRefState::same_database("readWrite")]);
    }

    #[test]
    fn explicit_database_is_refreshed() {
        let merged = merge_role_refs(
            &[
                RoleRefState::in_database("read", "reporting"),
                RoleRefState::same_database("dbAdmin"),
            ],
            &[fetched("read", "reporting"), fetched("dbAdmin", "sales")],
        )
        .unwrap();

        assert_eq!(
            merged,
            vec![
                RoleRefState::in_database("read", "reporting"),
                RoleRefState::same_database("dbAdmin"),
            ]
        );
    }

    #[test]
    fn count_mismatch_fails() {
        let err = merge_role_refs(
            &[RoleRefState::same_database("read")],
            &[fetched("read", "sales"), fetched("dbAdmin", "sales")],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MergeError::RoleReferenceCountMismatch {
                declared: 1,
                fetched: 2
            }
        ));
    }

    #[test]
    fn reordered_roles_fail() {
        let err = merge_role_refs(
            &[
                RoleRefState::same_database("readWrite"),
                RoleRefState::in_database("read", "reporting"),
            ],
            &[fetched("read", "reporting"), fetched("readWrite", "sales")],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            MergeError::RoleReferenceMismatch { index: 0, ref declared, ref fetched }
                if declared == "readWrite" && fetched == "read"
        ));
        assert_eq!(
            err.to_string(),
            "role reference #0 is declared as \"readWrite\", but the database reported \"read\""
        );
    }

    #[test]
    fn undeclared_field_is_left_alone() {
        let mut field: Option<Vec<u8>> = None;
        refresh_if_declared(&mut field, |_| Ok::<_, Infallible>(vec![1, 2])).unwrap();
        assert_eq!(field, None);

        let mut field = Some(Vec::new());
        refresh_if_declared(&mut field, |_| Ok::<_, Infallible>(vec![1, 2])).unwrap();
        assert_eq!(field, Some(vec![1, 2]));
    }

    #[test]
    fn decode_privileges_reports_index() {
        let fetched: Vec<PrivilegeDocument> = serde_json::from_value(json!([
            {"resource": {"cluster": true}, "actions": ["inprog"]},
            {"resource": {"anyResource": 1}, "actions": ["anyAction"]},
        ]))
        .unwrap();

        let err = decode_privileges(&fetched).unwrap_err();
        assert!(matches!(err, MergeError::DecodePrivilege { index: 1, .. }));
        assert_eq!(
            err.to_string(),
            "failed to decode the resource of privilege #1"
        );
    }
}
