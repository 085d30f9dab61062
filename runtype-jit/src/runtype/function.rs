//! Function signatures are never compiled as a whole: their parameter list
//! and return type are separate run types that compile on their own. A
//! function-typed value nested in data contributes nothing.

use crate::code::Code;
use crate::compiler::{Compiler, Scope};
use crate::{JitError, Operation};

impl Compiler<'_> {
    pub(crate) fn emit_function(
        &self,
        scope: &Scope<'_>,
        op: Operation,
    ) -> Result<Option<Code>, JitError> {
        if scope.is_root() {
            return Err(JitError::UnsupportedOperation {
                op,
                kind: "function",
                reason: "compile its parameters or its return type instead",
            });
        }
        Ok(None)
    }
}
