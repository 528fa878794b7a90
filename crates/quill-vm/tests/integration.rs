//! End-to-end tests that run real source text through the full
//! lex -> parse -> compile -> execute pipeline, mirroring the concrete
//! scenarios a host embedding this toolchain would actually exercise.
//! Unit tests elsewhere hand-assemble bytecode to pin down individual
//! opcodes; these confirm the pieces compose.

use std::cell::RefCell;
use std::rc::Rc;

use quill_bytecode::{Host, LogLevel, Metadata, Value, VmHandle};
use quill_compiler::NullResolver;
use quill_core::SourceId;
use quill_vm::Vm;

#[derive(Default)]
struct LoggingHost {
    log: Rc<RefCell<Vec<String>>>,
}

impl Host for LoggingHost {
    fn log(&mut self, _level: LogLevel, message: &str) {
        self.log.borrow_mut().push(message.to_string());
    }
}

fn compile_and_sign(source: &str) -> quill_bytecode::Chunk {
    let (tokens, lex_errors) = quill_lexer::lex(source);
    assert!(lex_errors.is_empty(), "lexer errors: {lex_errors:?}");

    let parse_outcome = quill_parser::parse(tokens, SourceId(0));
    assert!(!parse_outcome.has_errors(), "parser errors: {:?}", parse_outcome.errors);

    let mut resolver = NullResolver;
    let outcome = quill_compiler::compile(
        parse_outcome.program,
        SourceId(0),
        &mut resolver,
        Metadata::default(),
        String::new(),
    );
    assert!(!outcome.has_errors(), "compiler errors: {:?}", outcome.errors);

    let mut chunk = outcome.chunk;
    chunk.signature = quill_bytecode::compute_signature(&chunk);
    chunk
}

#[test]
fn arithmetic_scenario_logs_fourteen() {
    let chunk = compile_and_sign("int x = 2 + 3 * 4; print((string)x);");
    let mut vm = Vm::new(LoggingHost::default());
    assert!(vm.execute(chunk, false));
    assert_eq!(vm.into_host().log.borrow().as_slice(), ["14"]);
}

#[test]
fn conditional_and_function_scenario_logs_eleven() {
    let source = "\
        int Max(int a, int b) { if (a > b) return a; return b; }\n\
        print((string)Max(7, 11));\
    ";
    let chunk = compile_and_sign(source);
    let mut vm = Vm::new(LoggingHost::default());
    assert!(vm.execute(chunk, false));
    assert_eq!(vm.into_host().log.borrow().as_slice(), ["11"]);
}

#[test]
fn loop_with_break_scenario_logs_ten() {
    let source = "\
        int i = 0; int sum = 0;\n\
        while (i < 10) { if (i == 5) break; sum = sum + i; i = i + 1; }\n\
        print((string)sum);\
    ";
    let chunk = compile_and_sign(source);
    let mut vm = Vm::new(LoggingHost::default());
    assert!(vm.execute(chunk, false));
    assert_eq!(vm.into_host().log.borrow().as_slice(), ["10"]);
}

#[test]
fn array_index_scenario_logs_four() {
    let chunk = compile_and_sign("int[] a = [3, 1, 4, 1, 5]; print((string)a[2]);");
    let mut vm = Vm::new(LoggingHost::default());
    assert!(vm.execute(chunk, false));
    assert_eq!(vm.into_host().log.borrow().as_slice(), ["4"]);
}

#[test]
fn array_element_assignment_is_visible_to_a_later_read() {
    // Exercises the compiler's write-back of a mutated container into its
    // originating slot: without it, `a[2] = 9;` would mutate a copy that
    // the following `a[2]` read never sees.
    let source = "int[] a = [3, 1, 4, 1, 5]; a[2] = 9; print((string)a[2]);";
    let chunk = compile_and_sign(source);
    let mut vm = Vm::new(LoggingHost::default());
    assert!(vm.execute(chunk, false));
    assert_eq!(vm.into_host().log.borrow().as_slice(), ["9"]);
}

struct SleepyHost {
    log: Rc<RefCell<Vec<String>>>,
}

impl Host for SleepyHost {
    fn log(&mut self, _level: LogLevel, message: &str) {
        self.log.borrow_mut().push(message.to_string());
    }

    fn call_native(&mut self, name: &str, vm: &mut dyn VmHandle, _args: &[Value]) -> Option<Value> {
        if name == "sleep" {
            vm.pause();
            Some(Value::Nil)
        } else {
            None
        }
    }
}

#[test]
fn pause_and_resume_scenario_via_compiled_source() {
    let chunk = compile_and_sign(r#"print("A"); sleep(1); print("B");"#);
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut vm = Vm::new(SleepyHost { log: Rc::clone(&log) });

    assert!(vm.execute(chunk, false));
    assert_eq!(vm.state(), quill_vm::State::Paused);
    assert_eq!(log.borrow().as_slice(), ["A"]);

    assert!(vm.resume());
    assert_eq!(vm.state(), quill_vm::State::Finished);
    assert_eq!(log.borrow().as_slice(), ["A", "B"]);
}

#[test]
fn tampered_bytecode_is_rejected_by_signature_check() {
    let mut chunk = compile_and_sign("int x = 1; print((string)x);");
    chunk.code[0] ^= 0xFF;
    let mut vm = Vm::new(LoggingHost::default());
    assert!(!vm.execute(chunk, false));
    assert_eq!(vm.state(), quill_vm::State::Error);
}
