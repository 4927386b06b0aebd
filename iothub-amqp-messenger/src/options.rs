//! Snapshot and restore of configurable knobs
//!
//! A snapshot is an ordered list of named values. Snapshots nest: the
//! messenger snapshot embeds the send queue's own snapshot under
//! [`OPTION_SAVED_MESSAGE_QUEUE_OPTIONS`](crate::constants::OPTION_SAVED_MESSAGE_QUEUE_OPTIONS),
//! and cloning deep-copies the nested value.

use fe2o3_amqp_types::definitions::Seconds;

/// A single option value, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// A duration expressed in whole seconds.
    Seconds(Seconds),

    /// A plain counter.
    Count(u32),

    /// A nested snapshot.
    Snapshot(OptionsSnapshot),
}

/// An ordered set of named option values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsSnapshot {
    entries: Vec<(String, OptionValue)>,
}

impl OptionsSnapshot {
    /// Appends an entry. A name may appear only once; later pushes replace
    /// the earlier value in place.
    pub fn push(&mut self, name: impl Into<String>, value: OptionValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_replaces_existing_names() {
        let mut snapshot = OptionsSnapshot::default();
        snapshot.push("a", OptionValue::Count(1));
        snapshot.push("b", OptionValue::Seconds(2));
        snapshot.push("a", OptionValue::Count(3));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a"), Some(&OptionValue::Count(3)));
        let names: Vec<_> = snapshot.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn clone_deep_copies_nested_snapshots() {
        let mut inner = OptionsSnapshot::default();
        inner.push("timeout", OptionValue::Seconds(600));

        let mut outer = OptionsSnapshot::default();
        outer.push("queue", OptionValue::Snapshot(inner));

        let mut copy = outer.clone();
        copy.push("queue", {
            let mut replaced = OptionsSnapshot::default();
            replaced.push("timeout", OptionValue::Seconds(1));
            OptionValue::Snapshot(replaced)
        });

        assert_ne!(outer, copy);
        match outer.get("queue") {
            Some(OptionValue::Snapshot(inner)) => {
                assert_eq!(inner.get("timeout"), Some(&OptionValue::Seconds(600)));
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }
}
