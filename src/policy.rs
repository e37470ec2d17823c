use serde::Serialize;
use std::collections::BTreeSet;

/// The derived views making up the dashboard, in display order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Connectivity,
    DatabaseTypes,
    OsTotals,
    OsAverages,
    CompareLeft,
    CompareRight,
    Summary,
    RawTable,
}

impl View {
    pub const ALL: [View; 8] = [
        View::Connectivity,
        View::DatabaseTypes,
        View::OsTotals,
        View::OsAverages,
        View::CompareLeft,
        View::CompareRight,
        View::Summary,
        View::RawTable,
    ];
}

/// Things which can change underneath the views
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Input {
    Granularity,
    Mode,
    OsSubset,
    CompareLeft,
    CompareRight,
    /// The whole dataset was replaced
    Dataset,
}

/// Which views read which parameter.  `Input::Dataset` is absent: every view
/// reads the dataset.
const EDGES: &[(Input, View)] = &[
    (Input::Granularity, View::Connectivity),
    (Input::Granularity, View::DatabaseTypes),
    (Input::Granularity, View::CompareLeft),
    (Input::Granularity, View::CompareRight),
    (Input::Mode, View::Connectivity),
    (Input::Mode, View::DatabaseTypes),
    (Input::OsSubset, View::OsTotals),
    (Input::OsSubset, View::OsAverages),
    (Input::CompareLeft, View::CompareLeft),
    (Input::CompareRight, View::CompareRight),
];

/// The views which must be recomputed when `input` changes
pub fn dependents(input: Input) -> BTreeSet<View> {
    match input {
        Input::Dataset => View::ALL.iter().copied().collect(),
        input => EDGES
            .iter()
            .filter(|(i, _)| *i == input)
            .map(|(_, v)| *v)
            .collect(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// Everything presented is up to date
    Stable,
    /// These views are stale
    Dirty(BTreeSet<View>),
}

/// Tracks which views are stale.
///
/// Nothing has been presented when the policy is created, so it starts out
/// with every view dirty.
#[derive(Clone, Debug)]
pub struct Policy {
    state: State,
}

impl Default for Policy {
    fn default() -> Policy {
        Policy::new()
    }
}

impl Policy {
    pub fn new() -> Policy {
        Policy {
            state: State::Dirty(View::ALL.iter().copied().collect()),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_stable(&self) -> bool {
        self.state == State::Stable
    }

    pub fn invalidate(&mut self, input: Input) {
        let stale = dependents(input);
        match &mut self.state {
            State::Dirty(views) => views.extend(stale),
            State::Stable => self.state = State::Dirty(stale),
        }
    }

    /// The stale views, in display order
    pub fn pending(&self) -> Vec<View> {
        match &self.state {
            State::Stable => vec![],
            State::Dirty(views) => views.iter().copied().collect(),
        }
    }

    /// Marks views as handed over to the presenter
    pub fn complete(&mut self, presented: impl IntoIterator<Item = View>) {
        if let State::Dirty(views) = &mut self.state {
            for view in presented {
                views.remove(&view);
            }
            if views.is_empty() {
                self.state = State::Stable;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stable() -> Policy {
        let mut policy = Policy::new();
        policy.complete(View::ALL);
        assert!(policy.is_stable());
        policy
    }

    #[test]
    fn starts_dirty() {
        assert_eq!(Policy::new().pending(), View::ALL.to_vec());
    }

    #[test]
    fn mode_leaves_os_views_alone() {
        let mut policy = stable();
        policy.invalidate(Input::Mode);
        assert_eq!(policy.pending(), vec![View::Connectivity, View::DatabaseTypes]);
    }

    #[test]
    fn granularity_touches_time_views() {
        let mut policy = stable();
        policy.invalidate(Input::Granularity);
        assert_eq!(
            policy.pending(),
            vec![
                View::Connectivity,
                View::DatabaseTypes,
                View::CompareLeft,
                View::CompareRight
            ]
        );
    }

    #[test]
    fn os_subset_and_comparisons() {
        let mut policy = stable();
        policy.invalidate(Input::OsSubset);
        assert_eq!(policy.pending(), vec![View::OsTotals, View::OsAverages]);
        let mut policy = stable();
        policy.invalidate(Input::CompareRight);
        assert_eq!(policy.pending(), vec![View::CompareRight]);
    }

    #[test]
    fn replacement_dirties_everything() {
        let mut policy = stable();
        policy.invalidate(Input::Dataset);
        assert_eq!(policy.pending(), View::ALL.to_vec());
        assert!(dependents(Input::Dataset).contains(&View::Summary));
        assert!(dependents(Input::Dataset).contains(&View::RawTable));
    }

    #[test]
    fn summaries_only_follow_the_dataset() {
        for input in [
            Input::Granularity,
            Input::Mode,
            Input::OsSubset,
            Input::CompareLeft,
            Input::CompareRight,
        ] {
            let deps = dependents(input);
            assert!(!deps.contains(&View::Summary));
            assert!(!deps.contains(&View::RawTable));
        }
    }

    #[test]
    fn changes_accumulate_until_completed() {
        let mut policy = stable();
        policy.invalidate(Input::Mode);
        policy.invalidate(Input::OsSubset);
        assert_eq!(policy.pending().len(), 4);
        policy.complete([View::Connectivity, View::DatabaseTypes]);
        assert_eq!(
            policy.state(),
            &State::Dirty([View::OsTotals, View::OsAverages].into_iter().collect())
        );
        policy.complete([View::OsTotals, View::OsAverages]);
        assert_eq!(policy.state(), &State::Stable);
    }
}
