//! Symbols resolved by the host semantic model.
//!
//! The engine only needs a thin view of symbols: their identity, what kind of
//! declaration they are, whether their type can hold `null`, and a handful of flags
//! that drive built-in semantics (static members, methods that cannot throw,
//! well-known framework methods).

use std::{fmt, sync::Arc};

use bitflags::bitflags;
use strum::{AsRefStr, Display, EnumIter};

use crate::operation::TypeKind;

/// Identity of a symbol within one [`SymbolTable`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    /// Creates a symbol identifier from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        SymbolId(index)
    }

    /// Returns the raw index into the owning [`SymbolTable`].
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

/// The declaration kind of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum SymbolKind {
    /// A local variable, including catch variables and compiler-introduced locals.
    Local,
    /// A method or lambda parameter.
    Parameter,
    /// A field of the containing type.
    Field,
    /// A property of the containing type.
    Property,
    /// An event of the containing type.
    Event,
    /// A method.
    Method,
    /// A local function declared inside a method body.
    LocalFunction,
    /// A lambda or anonymous method.
    AnonymousFunction,
}

bitflags! {
    /// Additional facts about a symbol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SymbolFlags: u8 {
        /// The member is `static` and has no receiver.
        const STATIC = 0x01;
        /// Invoking this method never throws (used for test markers and pure helpers).
        const NO_THROW = 0x02;
        /// The field or local is read-only after initialization.
        const READ_ONLY = 0x04;
        /// The symbol was introduced by lowering and has no source declaration.
        const IMPLICIT = 0x08;
    }
}

/// Framework methods with built-in semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter)]
pub enum WellKnownMethod {
    /// `System.Threading.Monitor.Enter`: the argument becomes lock-held.
    MonitorEnter,
    /// `System.Threading.Monitor.Exit`: the argument becomes lock-released.
    MonitorExit,
    /// `IDisposable.Dispose`: the receiver becomes disposed.
    Dispose,
}

/// A resolved symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Source name.
    pub name: Arc<str>,
    /// Declaration kind.
    pub kind: SymbolKind,
    /// Type of the symbol's value (for methods, of the return value).
    pub ty: TypeKind,
    /// Additional facts.
    pub flags: SymbolFlags,
    /// Built-in semantics, for methods only.
    pub well_known: Option<WellKnownMethod>,
}

impl Symbol {
    /// Creates a symbol with no flags.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, kind: SymbolKind, ty: TypeKind) -> Self {
        Symbol {
            name: name.into(),
            kind,
            ty,
            flags: SymbolFlags::empty(),
            well_known: None,
        }
    }

    /// Returns this symbol with `flags` added.
    #[must_use]
    pub fn with_flags(mut self, flags: SymbolFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns this symbol marked as a well-known method.
    #[must_use]
    pub fn with_well_known(mut self, method: WellKnownMethod) -> Self {
        self.well_known = Some(method);
        self
    }

    /// Returns `true` for `static` members.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(SymbolFlags::STATIC)
    }

    /// Returns `true` if values of this symbol can be compared against `null`.
    ///
    /// Non-nullable value types never take part in the Object domain.
    #[must_use]
    pub fn can_be_null(&self) -> bool {
        self.ty.can_be_null()
    }
}

/// Arena of symbols for one compilation.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Adds a symbol and returns its identity.
    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        #[allow(clippy::cast_possible_truncation)]
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    /// Returns the symbol for `id`, if it belongs to this table.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Returns the first symbol with the given name and kind.
    #[must_use]
    pub fn find(&self, name: &str, kind: SymbolKind) -> Option<SymbolId> {
        self.iter()
            .find(|(_, symbol)| symbol.kind == kind && &*symbol.name == name)
            .map(|(id, _)| id)
    }

    /// Returns the first symbol with the given name, of any kind.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<SymbolId> {
        self.iter()
            .find(|(_, symbol)| &*symbol.name == name)
            .map(|(id, _)| id)
    }

    /// Iterates over `(id, symbol)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> + '_ {
        self.symbols.iter().enumerate().map(|(index, symbol)| {
            #[allow(clippy::cast_possible_truncation)]
            (SymbolId(index as u32), symbol)
        })
    }

    /// Returns the number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the table holds no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_table_lookup() {
        let mut table = SymbolTable::new();
        let local = table.add(Symbol::new("value", SymbolKind::Local, TypeKind::Value));
        let field = table.add(
            Symbol::new("value", SymbolKind::Field, TypeKind::Reference)
                .with_flags(SymbolFlags::STATIC),
        );

        assert_eq!(table.len(), 2);
        assert_eq!(table.find("value", SymbolKind::Field), Some(field));
        assert_eq!(table.find_by_name("value"), Some(local));
        assert!(table.get(field).unwrap().is_static());
        assert!(!table.get(local).unwrap().can_be_null());
        assert!(table.get(SymbolId::new(5)).is_none());
    }
}
