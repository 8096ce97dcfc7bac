//! Reader IR: the selections a snapshot materialises.
//!
//! Nodes are normally produced by a query compiler; the builders here are
//! enough to describe them by hand.

use crate::records::format_storage_key;
use crate::types::Variables;
use serde_json::Value;

/// A fragment or operation root.
#[derive(Clone, Debug, PartialEq)]
pub struct ReaderNode {
    pub name: String,
    pub selections: Vec<Selection>,
}

impl ReaderNode {
    pub fn new(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            name: name.into(),
            selections,
        }
    }

    /// Top-level linked field with the given name, looking through inline
    /// fragments and conditions.
    pub fn find_linked_field(&self, name: &str) -> Option<&LinkedField> {
        find_linked_field(&self.selections, name)
    }
}

fn find_linked_field<'a>(selections: &'a [Selection], name: &str) -> Option<&'a LinkedField> {
    selections.iter().find_map(|selection| match selection {
        Selection::Linked(field) if field.name == name => Some(field),
        Selection::InlineFragment { selections, .. } | Selection::Condition { selections, .. } => {
            find_linked_field(selections, name)
        }
        _ => None,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Scalar(ScalarField),
    Linked(LinkedField),
    /// Selections applied only when the record's type name matches.
    InlineFragment {
        type_condition: String,
        selections: Vec<Selection>,
    },
    /// Selections applied only when a boolean variable equals `passing_value`.
    Condition {
        condition: String,
        passing_value: bool,
        selections: Vec<Selection>,
    },
}

impl Selection {
    pub fn scalar(name: impl Into<String>) -> Self {
        Selection::Scalar(ScalarField::new(name))
    }

    pub fn linked(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Linked(LinkedField::new(name, selections))
    }

    pub fn plural(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Selection::Linked(LinkedField::new(name, selections).plural())
    }
}

impl From<ScalarField> for Selection {
    fn from(field: ScalarField) -> Self {
        Selection::Scalar(field)
    }
}

impl From<LinkedField> for Selection {
    fn from(field: LinkedField) -> Self {
        Selection::Linked(field)
    }
}

/// Field argument, either a literal or a reference to a selector variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Literal { name: String, value: Value },
    Variable { name: String, variable_name: String },
}

impl Argument {
    pub fn literal(name: impl Into<String>, value: Value) -> Self {
        Argument::Literal {
            name: name.into(),
            value,
        }
    }

    pub fn variable(name: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Argument::Variable {
            name: name.into(),
            variable_name: variable_name.into(),
        }
    }
}

/// Resolve arguments against `variables`. Missing variables resolve to null.
pub fn resolve_arguments(args: &[Argument], variables: &Variables) -> Variables {
    args.iter()
        .map(|arg| match arg {
            Argument::Literal { name, value } => (name.clone(), value.clone()),
            Argument::Variable {
                name,
                variable_name,
            } => (
                name.clone(),
                variables.get(variable_name).cloned().unwrap_or(Value::Null),
            ),
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    pub name: String,
    pub alias: Option<String>,
    pub args: Vec<Argument>,
}

impl ScalarField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn storage_key(&self, variables: &Variables) -> String {
        format_storage_key(&self.name, Some(&resolve_arguments(&self.args, variables)))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkedField {
    pub name: String,
    pub alias: Option<String>,
    pub args: Vec<Argument>,
    pub plural: bool,
    pub selections: Vec<Selection>,
}

impl LinkedField {
    pub fn new(name: impl Into<String>, selections: Vec<Selection>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            args: Vec::new(),
            plural: false,
            selections,
        }
    }

    pub fn plural(mut self) -> Self {
        self.plural = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn arg(mut self, arg: Argument) -> Self {
        self.args.push(arg);
        self
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn storage_key(&self, variables: &Variables) -> String {
        format_storage_key(&self.name, Some(&resolve_arguments(&self.args, variables)))
    }
}
