// MongoDB naming restrictions, see
// https://www.mongodb.com/docs/manual/reference/limits/#naming-restrictions and
// https://www.mongodb.com/docs/manual/reference/command/createRole/#rolename-limits

use std::{fmt::Display, sync::LazyLock};

use const_format::concatcp;
use regex::Regex;
use snafu::Snafu;

/// The characters forbidden in database names (the Windows set, which is the
/// stricter one) including NUL.
const DATABASE_NAME_FORBIDDEN_CHARS: &str = "/\\\\. \"$*<>:|?\\x00";
const DATABASE_NAME_FMT: &str = concatcp!("[^", DATABASE_NAME_FORBIDDEN_CHARS, "]*");
const DATABASE_NAME_ERROR_MSG: &str =
    "a database name must not contain any of the characters /\\. \"$*<>:|? or NUL";
const DATABASE_NAME_MAX_LENGTH: usize = 64;

/// Roles cannot be created in this database.
const LOCAL_DATABASE: &str = "local";

/// Role names must be at least one byte and no more than 7 MB long.
const ROLE_NAME_MAX_LENGTH: usize = 7 * 1000 * 1000;

static DATABASE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DATABASE_NAME_FMT}$")).expect("failed to compile database name regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug, PartialEq, Eq)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}
impl std::error::Error for Errors {}

/// A single validation error.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("{msg} (regex used for validation is {regex:?})"))]
    Regex {
        msg: &'static str,
        regex: &'static str,
    },

    #[snafu(display("input is {length} bytes long but must be no more than {max_length}"))]
    TooLong { length: usize, max_length: usize },

    #[snafu(display("input must not be empty"))]
    Empty,

    #[snafu(display("input must not be {value:?}"))]
    Reserved { value: &'static str },
}

/// Returns [`Ok`] if `value`'s length fits within `min_length..=max_length`.
fn validate_str_length(value: &str, min_length: usize, max_length: usize) -> Result<(), Error> {
    if value.len() < min_length {
        EmptySnafu.fail()
    } else if value.len() > max_length {
        TooLongSnafu {
            length: value.len(),
            max_length,
        }
        .fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if `value` matches `regex`.
fn validate_str_regex(
    value: &str,
    regex: &'static Regex,
    error_msg: &'static str,
) -> Result<(), Error> {
    if regex.is_match(value) {
        Ok(())
    } else {
        RegexSnafu {
            msg: error_msg,
            regex: regex
                .as_str()
                // Clean up start/end-of-line markers
                .trim_start_matches('^')
                .trim_end_matches('$'),
        }
        .fail()
    }
}

fn validate_not_reserved(value: &str, reserved: &'static str) -> Result<(), Error> {
    if value == reserved {
        ReservedSnafu { value: reserved }.fail()
    } else {
        Ok(())
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(Result::err)
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Tests for a non-empty database name.
pub fn validate_database_name(value: &str) -> Result {
    validate_all([
        validate_str_length(value, 1, DATABASE_NAME_MAX_LENGTH),
        validate_str_regex(value, &DATABASE_NAME_REGEX, DATABASE_NAME_ERROR_MSG),
    ])
}

/// Like [`validate_database_name`], but also accepts the empty string.
pub fn validate_optional_database_name(value: &str) -> Result {
    validate_all([
        validate_str_length(value, 0, DATABASE_NAME_MAX_LENGTH),
        validate_str_regex(value, &DATABASE_NAME_REGEX, DATABASE_NAME_ERROR_MSG),
    ])
}

/// Tests for a database roles can be created in.
pub fn validate_role_database_name(value: &str) -> Result {
    validate_all([
        validate_str_length(value, 1, DATABASE_NAME_MAX_LENGTH),
        validate_str_regex(value, &DATABASE_NAME_REGEX, DATABASE_NAME_ERROR_MSG),
        validate_not_reserved(value, LOCAL_DATABASE),
    ])
}

pub fn validate_role_name(value: &str) -> Result {
    validate_all([validate_str_length(value, 1, ROLE_NAME_MAX_LENGTH)])
}
