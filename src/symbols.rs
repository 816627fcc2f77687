//! Global symbol table: one flat namespace, filled in by `int` declarations.

use std::collections::HashMap;

/// Opaque handle to a variable's storage. Handles are dense indices in
/// declaration order, which backends reuse for their storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

impl SymbolId {
  pub fn index(self) -> usize {
    self.0
  }
}

/// Symbol a variable's storage is emitted under in assembly and IR. Source
/// identifiers never contain `.`, so these cannot clash with `main`,
/// `printint`, libc or compiler-generated labels.
pub fn link_name(name: &str) -> String {
  format!("v.{name}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  pub id: SymbolId,
}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
  symbols: Vec<Symbol>,
  by_name: HashMap<String, SymbolId>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `name` and hand back its storage handle. Declaring a name twice
  /// is not an error; the second declaration refers to the same storage.
  pub fn declare(&mut self, name: &str) -> SymbolId {
    if let Some(&id) = self.by_name.get(name) {
      return id;
    }
    let id = SymbolId(self.symbols.len());
    self.symbols.push(Symbol {
      name: name.to_string(),
      id,
    });
    self.by_name.insert(name.to_string(), id);
    id
  }

  pub fn lookup(&self, name: &str) -> Option<SymbolId> {
    self.by_name.get(name).copied()
  }

  pub fn get(&self, id: SymbolId) -> &Symbol {
    &self.symbols[id.0]
  }

  pub fn name(&self, id: SymbolId) -> &str {
    &self.get(id).name
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  /// Symbols in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
    self.symbols.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn declare_then_lookup() {
    let mut table = SymbolTable::new();
    let x = table.declare("x");
    let y = table.declare("y");
    assert_ne!(x, y);
    assert_eq!(table.lookup("x"), Some(x));
    assert_eq!(table.lookup("y"), Some(y));
    assert_eq!(table.lookup("z"), None);
    assert_eq!(table.name(y), "y");
  }

  #[test]
  fn redeclaration_reuses_storage() {
    let mut table = SymbolTable::new();
    let first = table.declare("count");
    table.declare("other");
    let again = table.declare("count");
    assert_eq!(first, again);
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn iterates_in_declaration_order() {
    let mut table = SymbolTable::new();
    for name in ["c", "a", "b"] {
      table.declare(name);
    }
    let names: Vec<_> = table.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
    let indices: Vec<_> = table.iter().map(|s| s.id.index()).collect();
    assert_eq!(indices, vec![0, 1, 2]);
  }

  #[test]
  fn link_names_are_prefixed() {
    assert_eq!(link_name("main"), "v.main");
    assert_eq!(link_name("L1"), "v.L1");
  }
}
