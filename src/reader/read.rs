//! Materialise snapshots from a record source.

use super::node::{LinkedField, ScalarField, Selection};
use crate::error::Result;
use crate::records::{Record, RecordSource, ID_KEY, TYPENAME_KEY};
use crate::types::{DataId, RecordStatus, Selector, Snapshot, Variables};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Read `selector` out of `source`.
pub fn read(source: &dyn RecordSource, selector: &Selector) -> Result<Snapshot> {
    let mut reader = RecordReader {
        source,
        variables: &selector.variables,
        seen_records: HashSet::new(),
        is_missing_data: false,
    };

    let root = selector.data_id.as_str();
    reader.seen_records.insert(selector.data_id.clone());
    let data = match (source.status(root), source.get(root)) {
        (RecordStatus::Existent, Some(record)) => {
            let mut data = Map::new();
            reader.traverse(&selector.node.selections, record, &mut data)?;
            Some(Value::Object(data))
        }
        (RecordStatus::Nonexistent, _) => Some(Value::Null),
        _ => {
            reader.is_missing_data = true;
            None
        }
    };

    Ok(Snapshot {
        selector: selector.clone(),
        data,
        seen_records: reader.seen_records,
        is_missing_data: reader.is_missing_data,
    })
}

struct RecordReader<'a> {
    source: &'a dyn RecordSource,
    variables: &'a Variables,
    seen_records: HashSet<DataId>,
    is_missing_data: bool,
}

impl<'a> RecordReader<'a> {
    fn traverse(
        &mut self,
        selections: &[Selection],
        record: &Record,
        data: &mut Map<String, Value>,
    ) -> Result<()> {
        for selection in selections {
            match selection {
                Selection::Scalar(field) => {
                    let value = self.read_scalar(field, record)?;
                    data.insert(field.response_key().to_string(), value);
                }
                Selection::Linked(field) => {
                    let value = if field.plural {
                        self.read_plural_link(field, record)?
                    } else {
                        self.read_link(field, record)?
                    };
                    data.insert(field.response_key().to_string(), value);
                }
                Selection::InlineFragment {
                    type_condition,
                    selections,
                } => {
                    if record.type_name() == type_condition {
                        self.traverse(selections, record, data)?;
                    }
                }
                Selection::Condition {
                    condition,
                    passing_value,
                    selections,
                } => {
                    let value = self.variables.get(condition).and_then(Value::as_bool);
                    if value == Some(*passing_value) {
                        self.traverse(selections, record, data)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_scalar(&mut self, field: &ScalarField, record: &Record) -> Result<Value> {
        match field.name.as_str() {
            ID_KEY => return Ok(Value::String(record.id().to_string())),
            TYPENAME_KEY => return Ok(Value::String(record.type_name().to_string())),
            _ => {}
        }
        let key = field.storage_key(self.variables);
        match record.get_value(&key)? {
            Some(value) => Ok(value),
            None => {
                self.is_missing_data = true;
                Ok(Value::Null)
            }
        }
    }

    fn read_link(&mut self, field: &LinkedField, record: &Record) -> Result<Value> {
        let key = field.storage_key(self.variables);
        if record.get(&key).is_none() {
            self.is_missing_data = true;
            return Ok(Value::Null);
        }
        match record.get_linked_record_id(&key)? {
            Some(id) => self.read_record(&field.selections, &id),
            None => Ok(Value::Null),
        }
    }

    fn read_plural_link(&mut self, field: &LinkedField, record: &Record) -> Result<Value> {
        let key = field.storage_key(self.variables);
        if record.get(&key).is_none() {
            self.is_missing_data = true;
            return Ok(Value::Null);
        }
        match record.get_linked_record_ids(&key)? {
            Some(ids) => {
                let items = ids
                    .iter()
                    .map(|id| self.read_record(&field.selections, id))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            None => Ok(Value::Null),
        }
    }

    fn read_record(&mut self, selections: &[Selection], id: &DataId) -> Result<Value> {
        self.seen_records.insert(id.clone());
        let source = self.source;
        match (source.status(id), source.get(id)) {
            (RecordStatus::Existent, Some(record)) => {
                let mut data = Map::new();
                self.traverse(selections, record, &mut data)?;
                Ok(Value::Object(data))
            }
            (RecordStatus::Nonexistent, _) => Ok(Value::Null),
            _ => {
                self.is_missing_data = true;
                Ok(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{Argument, ReaderNode};
    use crate::records::InMemoryRecordSource;
    use serde_json::json;
    use std::sync::Arc;

    fn source() -> InMemoryRecordSource {
        InMemoryRecordSource::from_json(&json!({
            "client:root": {"__id": "client:root", "__typename": "__Root", "me": {"__ref": "4"}},
            "4": {
                "__id": "4",
                "__typename": "User",
                "name": "Zuck",
                "friends(first:2)": {"__refs": ["5", "6"]},
                "bestFriend": null
            },
            "5": {"__id": "5", "__typename": "User", "name": "Mark"},
            "6": null
        }))
        .unwrap()
    }

    fn me_node() -> Arc<ReaderNode> {
        Arc::new(ReaderNode::new(
            "MeQuery",
            vec![Selection::linked(
                "me",
                vec![
                    Selection::scalar("__id"),
                    Selection::scalar("name"),
                    Selection::linked("bestFriend", vec![Selection::scalar("name")]),
                    Selection::Linked(
                        LinkedField::new("friends", vec![Selection::scalar("name")])
                            .plural()
                            .arg(Argument::variable("first", "count")),
                    ),
                ],
            )],
        ))
    }

    #[test]
    fn test_read_nested() {
        let source = source();
        let mut variables = Variables::new();
        variables.insert("count".into(), json!(2));
        let selector = Selector::new("client:root", me_node(), variables);

        let snapshot = read(&source, &selector).unwrap();
        assert_eq!(
            snapshot.data,
            Some(json!({
                "me": {
                    "__id": "4",
                    "name": "Zuck",
                    "bestFriend": null,
                    "friends": [{"name": "Mark"}, null]
                }
            }))
        );
        assert!(!snapshot.is_missing_data);
        let seen: HashSet<&str> = snapshot.seen_records.iter().map(|id| id.as_str()).collect();
        assert_eq!(seen, HashSet::from(["client:root", "4", "5", "6"]));
    }

    #[test]
    fn test_missing_field_flags_missing_data() {
        let source = source();
        let node = Arc::new(ReaderNode::new(
            "Q",
            vec![Selection::scalar("name"), Selection::scalar("email")],
        ));
        let snapshot = read(&source, &Selector::new("4", node, Variables::new())).unwrap();
        assert!(snapshot.is_missing_data);
        assert_eq!(snapshot.data, Some(json!({"name": "Zuck", "email": null})));
    }

    #[test]
    fn test_unknown_and_deleted_roots() {
        let source = source();
        let node = Arc::new(ReaderNode::new("Q", vec![Selection::scalar("name")]));

        let unknown = read(&source, &Selector::new("404", node.clone(), Variables::new())).unwrap();
        assert_eq!(unknown.data, None);
        assert!(unknown.is_missing_data);

        let deleted = read(&source, &Selector::new("6", node, Variables::new())).unwrap();
        assert_eq!(deleted.data, Some(Value::Null));
        assert!(!deleted.is_missing_data);
    }

    #[test]
    fn test_inline_fragment_and_condition() {
        let source = source();
        let node = Arc::new(ReaderNode::new(
            "Q",
            vec![
                Selection::InlineFragment {
                    type_condition: "User".into(),
                    selections: vec![Selection::scalar("name")],
                },
                Selection::InlineFragment {
                    type_condition: "Page".into(),
                    selections: vec![Selection::scalar("title")],
                },
                Selection::Condition {
                    condition: "withType".into(),
                    passing_value: true,
                    selections: vec![Selection::scalar("__typename")],
                },
            ],
        ));

        let mut variables = Variables::new();
        variables.insert("withType".into(), json!(true));
        let snapshot = read(&source, &Selector::new("4", node.clone(), variables)).unwrap();
        assert_eq!(snapshot.data, Some(json!({"name": "Zuck", "__typename": "User"})));

        let snapshot = read(&source, &Selector::new("4", node, Variables::new())).unwrap();
        assert_eq!(snapshot.data, Some(json!({"name": "Zuck"})));
    }

    #[test]
    fn test_scalar_read_of_link_is_an_error() {
        let source = source();
        let node = Arc::new(ReaderNode::new("Q", vec![Selection::scalar("me")]));
        assert!(read(&source, &Selector::root(node)).is_err());
    }
}
