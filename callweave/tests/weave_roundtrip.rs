//! End-to-end tests for the run-level guarantees: idempotence, backup/restore,
//! symbol alignment and naming reconciliation, exception-handler preservation, and
//! dependency handling.

mod common;

use callweave::bytecode::opcodes;
use callweave::metadata::symbols::{self, SequencePoint, SymbolConvention, SymbolFile};
use callweave::prelude::*;
use common::*;

fn simple_module(name: &str) -> (Module, Token) {
    let mut module = Module::new(name);
    let foo = module.add_top_level_type(TypeDef::new("Demo", "Foo"));
    let bar = module
        .add_method(foo, method_with_body("Bar", ret_body()))
        .unwrap();
    (module, bar)
}

#[test]
fn s4_second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let (mut module, _) = simple_module("demo");
    let path = write_to(dir.path(), &mut module);

    weave(quiet_config(&path));
    let after_first = std::fs::read(&path).unwrap();

    let outcome = Weaver::new(quiet_config(&path)).run().unwrap();
    assert!(matches!(outcome, WeaveOutcome::AlreadyInstrumented));

    let after_second = std::fs::read(&path).unwrap();
    assert_eq!(after_first, after_second, "second run must write nothing");
}

#[test]
fn guard_fires_even_with_a_custom_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let (mut module, _) = simple_module("demo");
    let path = write_to(dir.path(), &mut module);

    let mut config = quiet_config(&path);
    config.field_prefix = "_hits_".to_string();
    weave(config);

    let mut again = quiet_config(&path);
    again.field_prefix = "_hits_".to_string();
    let outcome = Weaver::new(again).run().unwrap();
    assert!(matches!(outcome, WeaveOutcome::AlreadyInstrumented));
}

#[test]
fn s6_backup_and_restore_round_trip() {
    let source_dir = tempfile::tempdir().unwrap();
    let backup_dir = tempfile::tempdir().unwrap();

    let (mut module, _) = simple_module("app");
    let path = write_to(source_dir.path(), &mut module);
    let pristine = std::fs::read(&path).unwrap();

    let mut config = WeaveConfig::new(&path);
    config.backup_dir = Some(backup_dir.path().to_path_buf());
    weave(config);

    assert_ne!(std::fs::read(&path).unwrap(), pristine, "weave must modify");

    let backup = backup_dir.path().join("app.sbm.bak");
    assert_eq!(std::fs::read(&backup).unwrap(), pristine);

    let sidecar = backup_dir.path().join("app.sbm.bak.path");
    let recorded = std::fs::read_to_string(&sidecar).unwrap();
    assert_eq!(
        std::path::PathBuf::from(recorded.trim()),
        std::path::absolute(&path).unwrap()
    );

    let restored_to = BackupManager::restore(&backup).unwrap();
    assert_eq!(restored_to, std::path::absolute(&path).unwrap());
    assert_eq!(
        std::fs::read(&path).unwrap(),
        pristine,
        "restore must be byte-identical to the pre-weave input"
    );
}

#[test]
fn output_path_leaves_the_input_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (mut module, _) = simple_module("demo");
    let path = write_to(dir.path(), &mut module);
    let pristine = std::fs::read(&path).unwrap();

    let out_path = dir.path().join("demo.instrumented.sbm");
    let mut config = quiet_config(&path);
    config.output_path = Some(out_path.clone());
    weave(config);

    assert_eq!(std::fs::read(&path).unwrap(), pristine);
    let woven = reload(&out_path);
    assert!(find_type(&woven, "Demo.Foo_InvokeCounters").is_some());
}

#[test]
fn symbols_are_remapped_and_reconciled_to_the_short_convention() {
    let dir = tempfile::tempdir().unwrap();
    let (mut module, bar) = simple_module("demo");
    let path = write_to(dir.path(), &mut module);

    let module_bytes = std::fs::read(&path).unwrap();
    let mut symbol_file = SymbolFile::new(&module_bytes);
    symbol_file.files.push("src/foo.vs".to_string());
    symbol_file.methods.push(
        callweave::metadata::symbols::MethodSymbols {
            method: bar,
            points: vec![SequencePoint {
                il_offset: 0,
                line: 12,
                file: 0,
            }],
        },
    );
    let short_path = symbols::symbol_path(&path, SymbolConvention::Short);
    symbol_file.write_file(&short_path).unwrap();

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.symbol_path.as_deref(), Some(short_path.as_path()));

    assert!(short_path.is_file(), "output stays on the input's convention");
    assert!(
        !symbols::symbol_path(&path, SymbolConvention::Long).is_file(),
        "the long-convention intermediate must be renamed away"
    );

    // Fingerprint matches the woven module, and the sequence point moved behind
    // the 12-byte prelude.
    let woven_bytes = std::fs::read(&path).unwrap();
    let rewritten = SymbolFile::from_file(&short_path, &woven_bytes).unwrap();
    assert_eq!(rewritten.methods[0].points[0].il_offset, 12);
    assert_eq!(rewritten.methods[0].points[0].line, 12);
}

#[test]
fn long_convention_inputs_stay_on_the_long_convention() {
    let dir = tempfile::tempdir().unwrap();
    let (mut module, _) = simple_module("demo");
    let path = write_to(dir.path(), &mut module);

    let module_bytes = std::fs::read(&path).unwrap();
    let long_path = symbols::symbol_path(&path, SymbolConvention::Long);
    SymbolFile::new(&module_bytes).write_file(&long_path).unwrap();

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.symbol_path.as_deref(), Some(long_path.as_path()));
    assert!(long_path.is_file());
}

#[test]
fn handlers_survive_the_weave_and_entry_regions_extend() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");
    let foo = module.add_top_level_type(TypeDef::new("Demo", "Foo"));

    // try { nop; leave IL_0004 } finally { endfinally }; ret
    let mut body = body_of(vec![
        at(0, Instruction::new(opcodes::NOP, Operand::None)),
        at(1, Instruction::new(opcodes::LEAVE_S, Operand::Target(4))),
        at(3, Instruction::new(opcodes::ENDFINALLY, Operand::None)),
        at(4, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    body.handlers.push(ExceptionHandler {
        kind: ExceptionHandlerKind::Finally,
        try_offset: 0,
        try_length: 3,
        handler_offset: 3,
        handler_length: 1,
        filter_offset: 0,
    });
    module
        .add_method(foo, method_with_body("Guarded", body))
        .unwrap();
    let path = write_to(dir.path(), &mut module);

    weave(quiet_config(&path));
    let woven = reload(&path);

    let foo = find_type(&woven, "Demo.Foo").unwrap();
    let guarded = find_method(&woven, foo, "Guarded");
    let body = woven.method_def(guarded).unwrap().body.as_ref().unwrap();

    let handler = body.handlers[0];
    assert_eq!(
        handler.try_offset, 0,
        "a protected region starting at entry extends over the prelude"
    );
    assert_eq!(handler.try_length, 15, "12-byte prelude + nop + leave.s");
    assert_eq!(handler.handler_offset, 15);
    assert_eq!(handler.handler_length, 1);

    // The leave still exits to the ret.
    let leave = body.instructions.iter().find(|i| i.mnemonic() == "leave.s").unwrap();
    let Operand::Target(target) = leave.operand else {
        panic!("leave keeps a target");
    };
    let ret = body.instructions.iter().find(|i| i.mnemonic() == "ret").unwrap();
    assert_eq!(target, ret.offset);
}

#[test]
fn instrumented_dependency_skips_the_whole_run() {
    let dir = tempfile::tempdir().unwrap();

    // A dependency that a prior run already instrumented.
    let mut dependency = Module::new("depmod");
    let helper = dependency.add_top_level_type(TypeDef::new("Demo", "X_InvokeCounters"));
    FieldBuilder::new("_invokeCount_Y")
        .public()
        .static_()
        .ty(TypeSig::U4)
        .build(&mut dependency, helper)
        .unwrap();
    write_to(dir.path(), &mut dependency);

    let (mut module, _) = simple_module("demo");
    module.get_or_add_module_ref("depmod");
    let path = write_to(dir.path(), &mut module);

    let outcome = Weaver::new(quiet_config(&path)).run().unwrap();
    assert!(matches!(outcome, WeaveOutcome::AlreadyInstrumented));
}

#[test]
fn unresolvable_dependency_is_only_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let (mut module, _) = simple_module("demo");
    module.get_or_add_module_ref("missing");
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.methods_instrumented, 1);
}

#[test]
fn missing_input_fails_with_a_distinct_error() {
    let config = quiet_config(std::path::Path::new("/nonexistent/app.sbm"));
    let result = Weaver::new(config).run();
    assert!(matches!(result, Err(Error::InputNotFound(_))));
}
