//! Shared helpers for building, writing, and reloading test modules.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use callweave::bytecode::opcodes;
use callweave::metadata::writer::write_module;
use callweave::prelude::*;

/// Pins an instruction to an as-loaded byte offset, the way the decoder would.
pub fn at(offset: u64, mut instruction: Instruction) -> Instruction {
    instruction.offset = offset;
    instruction
}

/// A body containing exactly `ret`.
pub fn ret_body() -> MethodBody {
    body_of(vec![at(0, Instruction::new(opcodes::RET, Operand::None))])
}

/// A body from hand-laid-out instructions.
pub fn body_of(instructions: Vec<Instruction>) -> MethodBody {
    let mut body = MethodBody::new();
    body.instructions = instructions;
    body
}

/// A public method with the given body attached.
pub fn method_with_body(name: &str, body: MethodBody) -> MethodDef {
    let mut method = MethodDef::new(name, MethodSig::empty());
    method.body = Some(body);
    method
}

/// Serializes a module into `<dir>/<name>.sbm` and returns the path.
pub fn write_to(dir: &Path, module: &mut Module) -> PathBuf {
    let (bytes, _) = write_module(module).expect("test module must encode");
    let path = dir.join(format!("{}.sbm", module.name));
    std::fs::write(&path, bytes).expect("test module must write");
    path
}

/// Reloads a module from disk.
pub fn reload(path: &Path) -> Module {
    Loader::new(Vec::new())
        .load(path)
        .expect("woven module must load back")
        .module
}

/// A configuration with backups disabled, as most tests want.
pub fn quiet_config(path: &Path) -> WeaveConfig {
    let mut config = WeaveConfig::new(path);
    config.backup = false;
    config
}

/// Runs a weave and unwraps the summary.
pub fn weave(config: WeaveConfig) -> WeaveSummary {
    match Weaver::new(config).run().expect("weave must succeed") {
        WeaveOutcome::Woven(summary) => summary,
        WeaveOutcome::AlreadyInstrumented => panic!("module was unexpectedly instrumented"),
    }
}

/// Finds a top-level type by fully qualified name.
pub fn find_type(module: &Module, fqn: &str) -> Option<Token> {
    module
        .top_level_types()
        .iter()
        .copied()
        .find(|token| module.type_def(*token).unwrap().fqn() == fqn)
}

/// The single method named `name` on the given type.
pub fn find_method(module: &Module, ty: Token, name: &str) -> Token {
    module
        .type_def(ty)
        .unwrap()
        .methods
        .iter()
        .copied()
        .find(|token| module.method_def(*token).unwrap().name == name)
        .unwrap_or_else(|| panic!("method {name} not found"))
}

/// The single field named `name` on the given type.
pub fn find_field(module: &Module, ty: Token, name: &str) -> Option<Token> {
    module
        .type_def(ty)
        .unwrap()
        .fields
        .iter()
        .copied()
        .find(|token| module.field_def(*token).unwrap().name == name)
}

/// Mnemonics of a method's body, in order.
pub fn mnemonics(module: &Module, method: Token) -> Vec<&'static str> {
    module
        .method_def(method)
        .unwrap()
        .body
        .as_ref()
        .unwrap()
        .instructions
        .iter()
        .map(Instruction::mnemonic)
        .collect()
}

/// Asserts that the four instructions starting at `index` are the counter prelude
/// referencing `field`.
pub fn assert_prelude(instructions: &[Instruction], index: usize, field: Token) {
    assert_eq!(instructions[index].mnemonic(), "ldsfld");
    assert_eq!(instructions[index].operand, Operand::Token(field));
    assert_eq!(instructions[index + 1].mnemonic(), "ldc.i4.1");
    assert_eq!(instructions[index + 2].mnemonic(), "add");
    assert_eq!(instructions[index + 3].mnemonic(), "stsfld");
    assert_eq!(instructions[index + 3].operand, Operand::Token(field));
}
