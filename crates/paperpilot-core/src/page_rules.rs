// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page transition rules.
//
// Pure functions over a page's mutable fields.  The session applies them
// optimistically before the server has confirmed anything, so they must not
// touch I/O.

use crate::types::{Page, PageEdit, PageStatus};

/// Rotation step applied by a single rotate action, in degrees.
pub const ROTATION_STEP: u16 = 90;

/// Advance a page status one step: valid → delete → split → valid.
///
/// The order is kept literally as the operators know it.  Whether `split`
/// belongs in the manual cycle at all is an open product question.
pub fn cycle_status(current: PageStatus) -> PageStatus {
    match current {
        PageStatus::Valid => PageStatus::Delete,
        PageStatus::Delete => PageStatus::Split,
        PageStatus::Split => PageStatus::Valid,
    }
}

/// Rotate a quarter turn clockwise.  Always returns 0, 90, 180 or 270; an
/// off-grid input is first snapped down to the nearest quarter turn.
pub fn rotate(current: u16) -> u16 {
    let snapped = current % 360 / ROTATION_STEP * ROTATION_STEP;
    (snapped + ROTATION_STEP) % 360
}

/// Edit that cycles the status of `page`.
pub fn toggle_edit(page: &Page) -> PageEdit {
    PageEdit::status(cycle_status(page.status))
}

/// Edit that rotates `page` by one step.
pub fn rotate_edit(page: &Page) -> PageEdit {
    PageEdit::rotation(rotate(page.rotation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: PageStatus, rotation: u16) -> Page {
        Page {
            page_number: 0,
            image_path: "doc/page_0.jpg".into(),
            status,
            rotation,
            original_width: 0,
            original_height: 0,
        }
    }

    #[test]
    fn status_cycle_order() {
        assert_eq!(cycle_status(PageStatus::Valid), PageStatus::Delete);
        assert_eq!(cycle_status(PageStatus::Delete), PageStatus::Split);
        assert_eq!(cycle_status(PageStatus::Split), PageStatus::Valid);
    }

    #[test]
    fn status_cycle_has_period_three() {
        for start in [PageStatus::Valid, PageStatus::Delete, PageStatus::Split] {
            let once = cycle_status(start);
            assert_ne!(once, start);
            assert_eq!(cycle_status(cycle_status(once)), start);
        }
    }

    #[test]
    fn rotate_stays_in_quarter_turns() {
        for start in [0, 90, 180, 270] {
            assert!([0, 90, 180, 270].contains(&rotate(start)));
        }
        assert_eq!(rotate(270), 0);
        // Out-of-range input from a misbehaving server still lands on a quarter turn.
        assert_eq!(rotate(360), 90);
        assert_eq!(rotate(u16::MAX), 90);
        assert_eq!(rotate(100), 180);
    }

    #[test]
    fn four_rotations_are_identity() {
        for start in [0, 90, 180, 270] {
            let back = (0..4).fold(start, |r, _| rotate(r));
            assert_eq!(back, start);
        }
    }

    #[test]
    fn edits_leave_other_field_alone() {
        let p = page(PageStatus::Delete, 180);
        assert_eq!(toggle_edit(&p), PageEdit::status(PageStatus::Split));
        assert_eq!(rotate_edit(&p), PageEdit::rotation(270));
    }
}
