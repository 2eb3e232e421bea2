//! The global signature: everything declared at the toplevel, in insertion
//! order so elaboration is reproducible.

use crate::error::{Error, Result};
use crate::loc::Loc;
use crate::name::Name;
use crate::tt::Type;
use std::collections::HashMap;
use std::fmt::Display;

#[derive(Debug, Clone)]
pub enum Decl {
    /// `constant c : T`
    Constant(Type),
    /// A derivation rule: premise hints plus the full Π-type folding the
    /// premise telescope over the conclusion boundary. Built only by the
    /// driver through the kernel, so the stored type is known well-formed.
    Rule(Rule),
    /// A record signature: ordered labelled fields; each field type may
    /// refer to earlier fields through bound indices (0 = previous field).
    SigDef(SigDef),
    /// `operation op : arity`
    MlOperation { arity: usize },
    /// An ML sum type: constructor tags with arities.
    MlType { constructors: Vec<(Name, usize)> },
    /// A dynamic variable backed by the driver-owned cell `cell`.
    Dynamic { cell: usize },
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub premises: Vec<Name>,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct SigDef {
    pub fields: Vec<SigField>,
}

#[derive(Debug, Clone)]
pub struct SigField {
    pub label: Name,
    pub hint: Name,
    /// under one binder per preceding field
    pub ty: Type,
}

#[derive(Debug, Clone, Default)]
pub struct Signature {
    entries: Vec<(Name, Decl)>,
    index: HashMap<Name, usize>,
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (x, d) in &self.entries {
            match d {
                Decl::Constant(ty) => writeln!(f, "constant {x} : {ty}")?,
                Decl::Rule(rule) => writeln!(f, "rule {x} : {}", rule.ty)?,
                Decl::SigDef(s) => {
                    write!(f, "signature {x} {{")?;
                    for field in &s.fields {
                        write!(f, " {} : {};", field.label, field.ty)?;
                    }
                    writeln!(f, " }}")?
                }
                Decl::MlOperation { arity } => writeln!(f, "operation {x}/{arity}")?,
                Decl::MlType { constructors } => {
                    write!(f, "mltype {x} =")?;
                    for (tag, arity) in constructors {
                        write!(f, " {tag}/{arity}")?;
                    }
                    writeln!(f)?
                }
                Decl::Dynamic { cell } => writeln!(f, "dynamic {x} @{cell}")?,
            }
        }
        Ok(())
    }
}

impl Signature {
    pub fn new() -> Signature {
        Default::default()
    }

    pub fn declare(&mut self, loc: Loc, name: Name, decl: Decl) -> Result<()> {
        if self.index.contains_key(&name) {
            return Err(Error::typing(loc, format!("{name} is already declared")));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push((name, decl));
        Ok(())
    }

    pub fn get(&self, name: Name) -> Option<&Decl> {
        self.index.get(&name).map(|&i| &self.entries[i].1)
    }

    pub fn constant_ty(&self, name: Name) -> Option<&Type> {
        match self.get(name)? {
            Decl::Constant(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn rule(&self, name: Name) -> Option<&Rule> {
        match self.get(name)? {
            Decl::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn sig_def(&self, name: Name) -> Option<&SigDef> {
        match self.get(name)? {
            Decl::SigDef(s) => Some(s),
            _ => None,
        }
    }

    pub fn operation_arity(&self, name: Name) -> Option<usize> {
        match self.get(name)? {
            Decl::MlOperation { arity } => Some(*arity),
            _ => None,
        }
    }

    pub fn dynamic_cell(&self, name: Name) -> Option<usize> {
        match self.get(name)? {
            Decl::Dynamic { cell } => Some(*cell),
            _ => None,
        }
    }

    /// Look a constructor tag up across all declared ML types.
    pub fn tag_arity(&self, tag: Name) -> Option<usize> {
        self.entries.iter().find_map(|(_, d)| match d {
            Decl::MlType { constructors } => constructors
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|&(_, arity)| arity),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Name, &Decl)> {
        self.entries.iter().map(|(x, d)| (*x, d))
    }
}
