//! Gate in front of the secret role.

use crate::protocol::RoleAssignment;

/// Whether the player has chosen to look at their role.
///
/// Independent of the room phase, except that there must be something to
/// show: revealing an [`Unassigned`](RoleAssignment::Unassigned) role does
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleReveal {
    open: bool,
}

impl RoleReveal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the reveal for `role`. Returns `true` if it is now open.
    pub fn reveal(&mut self, role: &RoleAssignment) -> bool {
        if role.is_assigned() {
            self.open = true;
        }
        self.open
    }

    /// Close the reveal. Returns `true` if it was open.
    pub fn dismiss(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn reveal_requires_an_assigned_role() {
        let mut reveal = RoleReveal::new();
        assert!(!reveal.reveal(&RoleAssignment::Unassigned));
        assert!(!reveal.is_open());

        assert!(reveal.reveal(&RoleAssignment::Spy));
        assert!(reveal.is_open());
    }

    #[test]
    fn dismiss_reports_previous_state() {
        let mut reveal = RoleReveal::new();
        assert!(!reveal.dismiss());

        reveal.reveal(&RoleAssignment::Player {
            secret_word: "lighthouse".into(),
        });
        assert!(reveal.dismiss());
        assert!(!reveal.is_open());
    }
}
