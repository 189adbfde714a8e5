/*!
Minion argument types.

  MinionId  - one opaque, non-empty minion identifier
  MinionArg - Single(id) | Multiple(ids), built once at the input boundary

Helpers:
  - MinionArg::from_values()  (CLI binding: 0 -> None, 1 -> Single, n -> Multiple)
  - MinionArg::ids()          (borrowed view in caller order)
  - serde: a JSON string deserializes to Single, an array of strings to Multiple
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// A minion identifier as known to the master's key store.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinionId(String);

impl MinionId {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidMinionId> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(InvalidMinionId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("minion identifier cannot be empty")]
pub struct InvalidMinionId;

impl TryFrom<String> for MinionId {
    type Error = InvalidMinionId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MinionId::new(value)
    }
}

impl From<MinionId> for String {
    fn from(id: MinionId) -> Self {
        id.0
    }
}

impl fmt::Display for MinionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `minion` parameter: one identifier or an ordered list of them.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MinionArg {
    Single(MinionId),
    Multiple(Vec<MinionId>),
}

impl MinionArg {
    /// Bind the values of a `--add` / `--delete` flag.
    ///
    /// No values means the argument is absent.
    pub fn from_values<I, S>(values: I) -> Result<Option<Self>, InvalidMinionId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = values
            .into_iter()
            .map(MinionId::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match ids.len() {
            0 => None,
            1 => ids.pop().map(MinionArg::Single),
            _ => Some(MinionArg::Multiple(ids)),
        })
    }

    /// Identifiers in caller order.
    pub fn ids(&self) -> &[MinionId] {
        match self {
            MinionArg::Single(id) => std::slice::from_ref(id),
            MinionArg::Multiple(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    /// Only an RPC `Multiple([])` can be empty; callers treat it as absent.
    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_values_binds_by_count() {
        assert_eq!(MinionArg::from_values(Vec::<String>::new()).unwrap(), None);

        let single = MinionArg::from_values(["node-1"]).unwrap().unwrap();
        assert!(matches!(single, MinionArg::Single(ref id) if id.as_str() == "node-1"));

        let multi = MinionArg::from_values(["node-1", "node-2"]).unwrap().unwrap();
        let names: Vec<&str> = multi.ids().iter().map(MinionId::as_str).collect();
        assert_eq!(names, vec!["node-1", "node-2"]);
    }

    #[test]
    fn blank_identifier_rejected() {
        assert_eq!(MinionId::new("  "), Err(InvalidMinionId));
        assert!(MinionArg::from_values(["ok", ""]).is_err());
    }

    #[test]
    fn deserialize_string_or_list() {
        let single: MinionArg = serde_json::from_value(json!("web-1")).unwrap();
        assert_eq!(single, MinionArg::Single(MinionId::new("web-1").unwrap()));

        let multi: MinionArg = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(multi.len(), 2);

        assert!(serde_json::from_value::<MinionArg>(json!(42)).is_err());
        assert!(serde_json::from_value::<MinionArg>(json!("")).is_err());
    }

    #[test]
    fn single_element_list_stays_multiple() {
        let arg: MinionArg = serde_json::from_value(json!(["only"])).unwrap();
        assert!(matches!(arg, MinionArg::Multiple(ref ids) if ids.len() == 1));
        assert!(!arg.is_empty());

        let empty: MinionArg = serde_json::from_value(json!([])).unwrap();
        assert!(empty.is_empty());
    }
}
