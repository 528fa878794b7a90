//! Runtime error kinds. Every one of these sets `Vm::state()` to `Error`
//! and appends a message to `Vm::errors()`; none of them ever panics.

/// What went wrong while executing a chunk.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// An opcode received operands of the wrong kind.
    #[error("type error in {op}: operands were {operands:?}")]
    TypeError {
        /// The opcode (or pseudo-operation, e.g. `"INDEX"`) that failed.
        op: String,
        /// The offending operands' type names.
        operands: Vec<String>,
    },
    /// `DIV`/`MOD` with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,
    /// `GET_ELEMENT`/`SET_ELEMENT` with an index outside `0..len`.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds {
        /// The array's length.
        len: usize,
        /// The offending index.
        index: i64,
    },
    /// `GET_FIELD`/`SET_FIELD` named a field not present in the struct
    /// value's name/value pairs.
    #[error("unknown field '{0}'")]
    UnknownField(String),
    /// `GET_GLOBAL`/`SET_GLOBAL` named a global that was never defined.
    #[error("undefined global '{0}'")]
    UndefinedGlobal(String),
    /// `CALL_NATIVE` named a function the host never registered.
    #[error("unknown native function '{0}'")]
    UnknownNative(String),
    /// `CALL` supplied a different argument count than the callee's arity.
    #[error("arity mismatch: expected {expected} arguments, got {got}")]
    ArityMismatch {
        /// The callee's declared arity.
        expected: u8,
        /// The number of arguments actually passed.
        got: u8,
    },
    /// The value stack grew past its configured depth limit.
    #[error("stack overflow")]
    StackOverflow,
    /// `CALL` would have nested deeper than the configured call-depth limit.
    #[error("call depth exceeded")]
    CallDepthExceeded,
    /// The instruction budget for this `execute`/`resume` call was spent.
    #[error("instruction limit exceeded")]
    InstructionLimit,
    /// The wall-clock budget for this `execute`/`resume` call elapsed.
    #[error("execution timed out")]
    Timeout,
    /// The bytecode referenced something the verifier should have caught,
    /// or the value stack was found in a shape dispatch didn't expect
    /// (e.g. an empty stack where an operand was required). Reaching this
    /// means a chunk passed verification but is unsound in a way the
    /// verifier's structural checks don't cover — it is never a panic.
    #[error("invalid bytecode encountered at runtime")]
    InvalidBytecode,
}
