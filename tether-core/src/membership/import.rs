//! Composite import ids for membership resources

use super::Membership;
use super::error::MembershipError;

/// Separator between the parent id and the item value
pub const IMPORT_DELIMITER: char = '/';

const EXPECTED_FORMAT: &str = "<parent_id>/<item_value>";

/// Parse `"<parent_id>/<item_value>"` into a tracked membership
///
/// The id is split at the first delimiter, so everything after it (slashes
/// included) is the item value: `"app123/https://host/callback"` yields
/// parent `app123` and value `https://host/callback`. A parent id containing
/// the delimiter cannot be imported.
pub fn parse_import_id(input: &str) -> Result<Membership, MembershipError> {
    let invalid = || MembershipError::InvalidImportId {
        input: input.to_string(),
        expected: EXPECTED_FORMAT,
    };

    let (parent_id, value) = input.split_once(IMPORT_DELIMITER).ok_or_else(invalid)?;
    if parent_id.is_empty() || value.is_empty() {
        return Err(invalid());
    }

    Ok(Membership::new(parent_id, value))
}
