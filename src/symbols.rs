use std::collections::HashMap;

/// Stable index of an interned group name.
///
/// Indices are handed out in first-appearance order, so the first group seen
/// in a fetch is `Symbol(0)`, the next new one `Symbol(1)`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

impl Symbol {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interner for the group names of one layout pass.
///
/// A fresh `Symbols` is built for every fetch; group identity never outlives
/// the event set it was computed from.
#[derive(Default, Debug)]
pub struct Symbols {
    map: HashMap<String, Symbol>,
    names: Vec<String>,
}

impl Symbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if it was seen before.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&symbol) = self.map.get(name) {
            return symbol;
        }

        let symbol = Symbol(self.names.len() as u32);
        self.names.push(name.to_string());
        self.map.insert(name.to_string(), symbol);
        symbol
    }

    /// Consume the interner, yielding names ordered by symbol index.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_first_appearance_ordered() {
        let mut symbols = Symbols::new();
        let sessions = symbols.intern("sessions");
        let queries = symbols.intern("queries");
        assert_eq!(symbols.intern("sessions"), sessions);
        assert_eq!(sessions.index(), 0);
        assert_eq!(queries.index(), 1);
        assert_eq!(symbols.into_names(), vec!["sessions", "queries"]);
    }
}
