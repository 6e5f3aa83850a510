//! # Instance identifiers.
//!
//! Every running occurrence of an application gets an opaque instance id:
//! a unique token with the target display's decimal digit appended. The
//! final character is the only structured part of the id; everything before
//! it is opaque.
//!
//! ## Rules
//! - Ids minted within the same millisecond on the same display must differ.
//! - [`display_id_of`] reads only the final character; anything outside the
//!   accepted range collapses to display 0.

use uuid::Uuid;

/// Mints a new instance id for the given display.
///
/// The id is a unique token concatenated with the decimal digit of
/// `display_id`, so the display can later be recovered with
/// [`display_id_of`].
pub fn generate_instance_id(display_id: i32) -> String {
    let mut instance_id = Uuid::new_v4().simple().to_string();
    instance_id.push_str(&display_id.to_string());
    instance_id
}

/// Derives the display id from the final character of an instance id.
///
/// Values outside `[0, 10]` collapse to 0. The inclusive upper bound of 10
/// is reachable only through the character after `'9'` and is kept for
/// wire compatibility.
pub fn display_id_of(instance_id: &str) -> i32 {
    let display_id = match instance_id.chars().last() {
        Some(c) => c as i32 - '0' as i32,
        None => return 0,
    };
    if !(0..=10).contains(&display_id) {
        return 0;
    }
    display_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_display_digit() {
        for display_id in 0..=9 {
            let id = generate_instance_id(display_id);
            assert_eq!(display_id_of(&id), display_id);
        }
    }

    #[test]
    fn ids_minted_back_to_back_differ() {
        let a = generate_instance_id(0);
        let b = generate_instance_id(0);
        assert_ne!(a, b);
    }

    #[test]
    fn out_of_range_suffix_collapses_to_zero() {
        assert_eq!(display_id_of("f3a1b"), 0);
        assert_eq!(display_id_of("f3a1/"), 0);
        assert_eq!(display_id_of(""), 0);
    }

    // The accepted range is inclusive of 10, so the character after '9'
    // maps to a tenth display instead of collapsing.
    #[test]
    fn derives_colon_as_tenth_display() {
        assert_eq!(display_id_of("f3a1:"), 10);
    }
}
