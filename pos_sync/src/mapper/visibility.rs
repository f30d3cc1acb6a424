//! Location visibility of catalog objects.

/// Resolve where a catalog object is sold from its visibility flags.
///
/// | `present_at_all` | present list | absent list | result |
/// |---|---|---|---|
/// | true | none | none | every known location |
/// | true | none | some | known minus absent |
/// | not true | some | none | the present list |
/// | not true | some | some | present minus absent |
/// | anything else | | | excluded (empty) |
///
/// Empty lists count as absent. The result only contains ids from `known`,
/// in the order of `known` for the "all" rules and of the present list otherwise.
pub fn resolve_locations(
    present_at_all: Option<bool>,
    present: Option<&[String]>,
    absent: Option<&[String]>,
    known: &[String],
) -> Vec<String> {
    let present = present.filter(|p| !p.is_empty());
    let absent = absent.filter(|a| !a.is_empty());
    let all = present_at_all.unwrap_or(false);
    let is_known = |id: &&String| known.contains(id);

    match (all, present, absent) {
        (true, None, None) => known.to_vec(),
        (true, None, Some(absent)) => known
            .iter()
            .filter(|l| !absent.contains(l))
            .cloned()
            .collect(),
        (false, Some(present), None) => present.iter().filter(is_known).cloned().collect(),
        (false, Some(present), Some(absent)) => present
            .iter()
            .filter(is_known)
            .filter(|l| !absent.contains(l))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}
