use std::collections::BTreeSet;

use crate::sensor::types::{BaseColor, MixedColor};

/// Fuse per-channel base colors into one decision.
///
/// Only the set of distinct colors matters, not which channel produced them. Three distinct
/// primaries at once are undecided.
pub fn resolve_mixed_color<I>(colors: I) -> Option<MixedColor>
where
    I: IntoIterator<Item = BaseColor>,
{
    let distinct: BTreeSet<BaseColor> = colors.into_iter().filter(BaseColor::is_some).collect();
    let mut iter = distinct.iter().copied();

    match (iter.next(), iter.next(), iter.next()) {
        (Some(only), None, None) => single(only),
        (Some(a), Some(b), None) => pair(a, b),
        _ => None,
    }
}

fn single(color: BaseColor) -> Option<MixedColor> {
    match color {
        BaseColor::Red => Some(MixedColor::Red),
        BaseColor::Blue => Some(MixedColor::Blue),
        BaseColor::Yellow => Some(MixedColor::Yellow),
        BaseColor::None => None,
    }
}

// Inputs arrive ordered (Red < Blue < Yellow)
fn pair(a: BaseColor, b: BaseColor) -> Option<MixedColor> {
    match (a, b) {
        (BaseColor::Red, BaseColor::Blue) => Some(MixedColor::Purple),
        (BaseColor::Red, BaseColor::Yellow) => Some(MixedColor::Orange),
        (BaseColor::Blue, BaseColor::Yellow) => Some(MixedColor::Green),
        _ => None,
    }
}
