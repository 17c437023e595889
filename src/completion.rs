//! Completion candidates for interactive shells.
//!
//! A [`Completions`] table starts out with every reserved operator spelling and the
//! structural keywords, and grows as the shell observes definitions:
//!
//! ```
//! use wal_reader::{completion::Completions, read_sexpr};
//!
//! let mut completions = Completions::new();
//! completions.observe(&read_sexpr("(defun count-edges [sig] 0)").unwrap());
//! assert_eq!(completions.candidates("count"), vec!["count-edges"]);
//! ```

use std::collections::BTreeSet;
use std::ops::Bound;

use crate::ast::{Node, Operator, Symbol};

/// Heads whose second element names a new binding
const DEFINING_FORMS: [&str; 2] = ["defun", "define"];

#[derive(Debug, Clone)]
pub struct Completions {
    words: BTreeSet<String>,
}

impl Default for Completions {
    fn default() -> Self {
        Self::new()
    }
}

impl Completions {
    pub fn new() -> Self {
        let words = Operator::PRIMITIVES
            .iter()
            .chain(Operator::STRUCTURAL.iter())
            .map(|operator| operator.spelling().to_owned())
            .chain(DEFINING_FORMS.iter().map(|form| (*form).to_owned()))
            .collect();
        Completions { words }
    }

    /// Record names bound by `(defun name ...)` and `(define name ...)` forms anywhere in `node`.
    pub fn observe(&mut self, node: &Node) {
        match node {
            Node::List(elements) => {
                if let [Node::Symbol(head), Node::Symbol(name), ..] = elements.as_slice()
                    && DEFINING_FORMS.contains(&head.name())
                {
                    self.insert(name);
                }
                elements.iter().for_each(|element| self.observe(element));
            }
            Node::ExpandGroup(members) => members.iter().for_each(|member| self.observe(member)),
            _ => {}
        }
    }

    /// Sorted words starting with `prefix`. An empty prefix yields nothing.
    pub fn candidates(&self, prefix: &str) -> Vec<&str> {
        if prefix.is_empty() {
            return Vec::new();
        }
        self.words
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|word| word.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn insert(&mut self, name: &Symbol) {
        if !self.words.contains(name.name()) {
            tracing::trace!(name = name.name(), "new completion");
            self.words.insert(name.name().to_owned());
        }
    }
}
