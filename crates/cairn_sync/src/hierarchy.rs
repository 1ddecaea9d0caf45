//! Inclusion for path-keyed trees, where a folder is included when
//! anything below it is.

use std::collections::BTreeSet;
use std::ops::Bound;

use crate::config::InclusionFilter;
use crate::item::Collection;
use crate::plan::MergePlan;
use crate::progress::Notices;

/// Separator between path segments.
pub const PATH_DELIMITER: char = '/';

/// Whether `path` is included directly, or any key strictly below it in
/// `all_keys` is.
///
/// Keys below `path` form one contiguous range of the sorted set, so only
/// that range is scanned.
pub fn is_included_transitively<P>(path: &str, included: P, all_keys: &BTreeSet<String>) -> bool
where
    P: Fn(&str) -> bool,
{
    included(path) || has_included_descendant(path, &included, all_keys)
}

fn has_included_descendant<P>(path: &str, included: &P, all_keys: &BTreeSet<String>) -> bool
where
    P: Fn(&str) -> bool,
{
    let prefix = format!("{path}{PATH_DELIMITER}");
    all_keys
        .range::<str, _>((Bound::Excluded(prefix.as_str()), Bound::Unbounded))
        .take_while(|key| key.starts_with(&prefix))
        .any(|key| included(key))
}

/// Plans folders against the keys of their contents.
///
/// Folders carry no comparable payload, so nothing is ever updated.
/// `contents` are the local keys of the files living in these folders.
pub fn plan_folders<'a, T, I>(
    local: &Collection<T>,
    remote: &Collection<T>,
    contents: I,
    filter: &InclusionFilter,
    notices: &Notices,
) -> MergePlan<T>
where
    T: Clone,
    I: IntoIterator<Item = &'a str>,
{
    let mut all_keys: BTreeSet<String> = local.keys().cloned().collect();
    all_keys.extend(contents.into_iter().map(str::to_string));

    let included = |key: &str| filter.is_included(key);
    let warn = |path: &str| {
        notices.verbose(&format!(
            "Skipping folder which exists locally, but is not included by filters, \
             and contains no included children: {path}"
        ));
    };

    let mut plan = MergePlan::default();

    for (path, folder) in local {
        let wanted = is_included_transitively(path, included, &all_keys);

        if remote.contains_key(path) {
            plan.to_skip.insert(path.clone());
            if !wanted {
                warn(path);
            }
        } else if wanted {
            plan.to_create.insert(path.clone(), folder.clone());
        } else {
            plan.to_skip.insert(path.clone());
            warn(path);
        }
    }

    for (path, folder) in remote {
        if local.contains_key(path) {
            continue;
        }
        if filter.is_included(path) {
            plan.to_remove.insert(path.clone(), folder.clone());
        } else {
            plan.to_skip.insert(path.clone());
        }
    }

    plan
}
