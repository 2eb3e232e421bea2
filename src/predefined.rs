//! The standard operations and tags every session starts with.
//!
//! Registering them in the signature gives user handlers something to
//! override; until then the driver answers with the defaults below, which
//! make the equality engine pure α-equality.

use crate::error::Result;
use crate::loc::Loc;
use crate::name::Name;
use crate::sig::{Decl, Signature};
use crate::value::Value;
use once_cell::sync::Lazy;

pub static EQUAL_TERM: Lazy<Name> = Lazy::new(|| Name::intern("equal_term").unwrap());
pub static EQUAL_TYPE: Lazy<Name> = Lazy::new(|| Name::intern("equal_type").unwrap());
pub static COERCE: Lazy<Name> = Lazy::new(|| Name::intern("coerce").unwrap());
pub static AS_PROD: Lazy<Name> = Lazy::new(|| Name::intern("as_prod").unwrap());
pub static AS_EQ: Lazy<Name> = Lazy::new(|| Name::intern("as_eq").unwrap());

pub static SOME: Lazy<Name> = Lazy::new(|| Name::intern("Some").unwrap());
pub static NONE: Lazy<Name> = Lazy::new(|| Name::intern("None").unwrap());
pub static NOT_COERCIBLE: Lazy<Name> = Lazy::new(|| Name::intern("NotCoercible").unwrap());
pub static CONVERTIBLE: Lazy<Name> = Lazy::new(|| Name::intern("Convertible").unwrap());
pub static COERCIBLE: Lazy<Name> = Lazy::new(|| Name::intern("Coercible").unwrap());

static OPTION_TY: Lazy<Name> = Lazy::new(|| Name::intern("option").unwrap());
static COERCIBLE_TY: Lazy<Name> = Lazy::new(|| Name::intern("coercible").unwrap());

pub fn install(sgn: &mut Signature) -> Result<()> {
    let loc = Loc::unknown();
    sgn.declare(loc, *EQUAL_TERM, Decl::MlOperation { arity: 2 })?;
    sgn.declare(loc, *EQUAL_TYPE, Decl::MlOperation { arity: 2 })?;
    sgn.declare(loc, *COERCE, Decl::MlOperation { arity: 2 })?;
    sgn.declare(loc, *AS_PROD, Decl::MlOperation { arity: 1 })?;
    sgn.declare(loc, *AS_EQ, Decl::MlOperation { arity: 1 })?;
    sgn.declare(
        loc,
        *OPTION_TY,
        Decl::MlType {
            constructors: vec![(*SOME, 1), (*NONE, 0)],
        },
    )?;
    sgn.declare(
        loc,
        *COERCIBLE_TY,
        Decl::MlType {
            constructors: vec![
                (*NOT_COERCIBLE, 0),
                (*CONVERTIBLE, 1),
                (*COERCIBLE, 1),
            ],
        },
    )?;
    Ok(())
}

/// The answer the driver gives when an operation escapes every handler.
/// `None` means the operation is genuinely unhandled.
pub fn default_answer(op: Name) -> Option<Value> {
    if op == *EQUAL_TERM || op == *EQUAL_TYPE || op == *AS_PROD || op == *AS_EQ {
        Some(mk_none())
    } else if op == *COERCE {
        Some(Value::Tag(*NOT_COERCIBLE, vec![]))
    } else {
        None
    }
}

pub fn mk_some(v: Value) -> Value {
    Value::Tag(*SOME, vec![v])
}

pub fn mk_none() -> Value {
    Value::Tag(*NONE, vec![])
}
