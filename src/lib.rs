//! A proof assistant for a dependent type theory with equality reflection.
//!
//! The trusted kernel ([jdg]) is the only producer of judgements; the
//! evaluator ([eval]) runs an ML-like language with algebraic effects whose
//! values include judgements; the engine ([equal]) dispatches equality and
//! coercion questions to user handlers and validates the answers. Surface
//! parsing and desugaring are external; this crate consumes the desugared
//! [syntax] directly.

use anyhow::Context;

pub mod assumption;
pub mod equal;
pub mod error;
pub mod eval;
pub mod jdg;
pub mod loc;
pub mod name;
pub mod predefined;
pub mod sig;
pub mod syntax;
pub mod toplevel;
pub mod tt;
pub mod value;

pub use error::{Error, ErrorKind};
pub use loc::Loc;
pub use name::{Atom, Name};
pub use toplevel::Toplevel;
pub use value::Value;

/// An embedder-facing session: the persistent toplevel state with the
/// predefined operations installed.
pub struct Session {
    top: Toplevel,
}

impl Session {
    pub fn new() -> anyhow::Result<Session> {
        let top = Toplevel::new().context("failed to initialize the session")?;
        Ok(Session { top })
    }

    pub fn set_verbosity(&mut self, verbosity: usize) {
        self.top.set_verbosity(verbosity);
    }

    /// Execute one toplevel item; `TopDo` items return their value.
    pub fn run(&mut self, item: &syntax::TopItem) -> anyhow::Result<Option<Value>> {
        self.top.run(item).context("toplevel item failed")
    }

    pub fn run_all<'a>(
        &mut self,
        items: impl IntoIterator<Item = &'a syntax::TopItem>,
    ) -> anyhow::Result<()> {
        for item in items {
            self.run(item)?;
        }
        Ok(())
    }
}
