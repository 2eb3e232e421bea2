use std::fmt::Display;

/// Position in the surface source, as reported by the external frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub line: u32,
    pub column: u32,
}

impl Loc {
    pub const fn unknown() -> Loc {
        Loc { line: 0, column: 0 }
    }

    pub fn new(line: u32, column: u32) -> Loc {
        Loc { line, column }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "?:?")
        }
    }
}
