//! End-to-end tests for caller-side instrumentation: bodyless methods counted at
//! their call sites.

mod common;

use callweave::bytecode::opcodes;
use callweave::prelude::*;
use common::*;

fn interface_with_log(module: &mut Module) -> (Token, Token) {
    let mut ilogger = TypeDef::new("Demo", "ILogger");
    ilogger.flags = TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
    let ilogger = module.add_top_level_type(ilogger);

    let mut log = MethodDef::new(
        "Log",
        MethodSig {
            ret: TypeSig::Void,
            params: vec![TypeSig::String],
        },
    );
    log.flags = MethodAttributes::PUBLIC | MethodAttributes::VIRTUAL | MethodAttributes::ABSTRACT;
    let log = module.add_method(ilogger, log).unwrap();

    (ilogger, log)
}

#[test]
fn s3_interface_call_site_gets_prelude_before_the_call() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");
    let (_, log) = interface_with_log(&mut module);

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    // ldnull; callvirt ILogger::Log; ret
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::LDNULL, Operand::None)),
        at(1, Instruction::new(opcodes::CALLVIRT, Operand::Token(log))),
        at(6, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.call_targets, 1, "ILogger::Log needs caller-side counting");
    assert_eq!(summary.call_sites_spliced, 1);

    let woven = reload(&path);
    let helper = find_type(&woven, "Demo.ILogger_InvokeCounters").expect("interface helper");
    let field = find_field(&woven, helper, "_invokeCount_Log").expect("interface counter field");

    let app = find_type(&woven, "Demo.App").unwrap();
    let main = find_method(&woven, app, "Main");
    let instructions = &woven.method_def(main).unwrap().body.as_ref().unwrap().instructions;

    let call_index = instructions
        .iter()
        .position(|i| i.mnemonic() == "callvirt")
        .expect("the call itself survives");
    assert!(call_index >= 4);
    assert_prelude(instructions, call_index - 4, field);

    // The callee reference is untouched.
    let resolved = woven.method_def(log).unwrap();
    assert_eq!(resolved.name, "Log");
}

#[test]
fn extern_methods_are_counted_at_call_sites() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");

    let native_ty = module.add_top_level_type(TypeDef::new("Demo", "Native"));
    let mut import = MethodDef::new("Beep", MethodSig::empty());
    import.flags = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::EXTERN;
    let import = module.add_method(native_ty, import).unwrap();

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::CALL, Operand::Token(import))),
        at(5, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.call_sites_spliced, 1);

    let woven = reload(&path);
    let helper = find_type(&woven, "Demo.Native_InvokeCounters").unwrap();
    assert!(find_field(&woven, helper, "_invokeCount_Beep").is_some());
}

#[test]
fn every_matching_call_site_is_spliced() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");
    let (_, log) = interface_with_log(&mut module);

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::LDNULL, Operand::None)),
        at(1, Instruction::new(opcodes::CALLVIRT, Operand::Token(log))),
        at(6, Instruction::new(opcodes::LDNULL, Operand::None)),
        at(7, Instruction::new(opcodes::CALLVIRT, Operand::Token(log))),
        at(12, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.call_sites_spliced, 2);

    let woven = reload(&path);
    let helper = find_type(&woven, "Demo.ILogger_InvokeCounters").unwrap();
    let field = find_field(&woven, helper, "_invokeCount_Log").unwrap();

    let app = find_type(&woven, "Demo.App").unwrap();
    let main = find_method(&woven, app, "Main");
    let instructions = &woven.method_def(main).unwrap().body.as_ref().unwrap().instructions;

    let call_indices: Vec<usize> = instructions
        .iter()
        .enumerate()
        .filter(|(_, i)| i.mnemonic() == "callvirt")
        .map(|(index, _)| index)
        .collect();
    assert_eq!(call_indices.len(), 2);
    for index in call_indices {
        assert_prelude(instructions, index - 4, field);
    }
}

#[test]
fn member_ref_callees_match_by_canonical_signature() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");
    let (_, _) = interface_with_log(&mut module);

    // A reference-table route to the same method, as a caller in another part of
    // the module graph would use.
    let self_ref = module.get_or_add_module_ref("demo");
    let ilogger_ref = module.get_or_add_type_ref(self_ref, "Demo", "ILogger");
    let log_ref = module.get_or_add_member_ref(MemberRef {
        parent: ilogger_ref,
        name: "Log".to_string(),
        signature: MemberRefSig::Method(MethodSig {
            ret: TypeSig::Void,
            params: vec![TypeSig::String],
        }),
    });

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::LDNULL, Operand::None)),
        at(1, Instruction::new(opcodes::CALLVIRT, Operand::Token(log_ref))),
        at(6, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.call_sites_spliced, 1, "MemberRef route must match too");
}

#[test]
fn mismatched_parameter_signature_does_not_match() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");
    let (_, _) = interface_with_log(&mut module);

    let self_ref = module.get_or_add_module_ref("demo");
    let ilogger_ref = module.get_or_add_type_ref(self_ref, "Demo", "ILogger");
    // Same name, different parameter list: a different overload.
    let other_overload = module.get_or_add_member_ref(MemberRef {
        parent: ilogger_ref,
        name: "Log".to_string(),
        signature: MemberRefSig::Method(MethodSig {
            ret: TypeSig::Void,
            params: vec![TypeSig::String, TypeSig::I4],
        }),
    });

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::LDNULL, Operand::None)),
        at(1, Instruction::new(opcodes::CALLVIRT, Operand::Token(other_overload))),
        at(6, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.call_sites_spliced, 0);
}

#[test]
fn calls_to_methods_with_bodies_are_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");

    let foo = module.add_top_level_type(TypeDef::new("Demo", "Foo"));
    let mut helper_method = method_with_body("Work", ret_body());
    helper_method.flags |= MethodAttributes::STATIC;
    let work = module.add_method(foo, helper_method).unwrap();

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::NOP, Operand::None)),
        at(1, Instruction::new(opcodes::CALL, Operand::Token(work))),
        at(6, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    let summary = weave(quiet_config(&path));
    assert_eq!(summary.call_sites_spliced, 0);

    let woven = reload(&path);
    let app = find_type(&woven, "Demo.App").unwrap();
    let main = find_method(&woven, app, "Main");
    let instructions = &woven.method_def(main).unwrap().body.as_ref().unwrap().instructions;

    let call_index = instructions
        .iter()
        .position(|i| i.mnemonic() == "call")
        .unwrap();
    assert_eq!(
        instructions[call_index - 1].mnemonic(),
        "nop",
        "no prelude may appear before a call whose callee has a body"
    );
}

#[test]
fn branch_into_a_spliced_call_lands_on_the_prelude() {
    let dir = tempfile::tempdir().unwrap();
    let mut module = Module::new("demo");

    let native_ty = module.add_top_level_type(TypeDef::new("Demo", "Native"));
    let mut import = MethodDef::new("Beep", MethodSig::empty());
    import.flags = MethodAttributes::PUBLIC | MethodAttributes::STATIC | MethodAttributes::EXTERN;
    let import = module.add_method(native_ty, import).unwrap();

    let app = module.add_top_level_type(TypeDef::new("Demo", "App"));
    // nop; br.s IL_0003; call Native::Beep; ret — a branch whose target is the call
    let body = body_of(vec![
        at(0, Instruction::new(opcodes::NOP, Operand::None)),
        at(1, Instruction::new(opcodes::BR_S, Operand::Target(3))),
        at(3, Instruction::new(opcodes::CALL, Operand::Token(import))),
        at(8, Instruction::new(opcodes::RET, Operand::None)),
    ]);
    module.add_method(app, method_with_body("Main", body)).unwrap();
    let path = write_to(dir.path(), &mut module);

    weave(quiet_config(&path));
    let woven = reload(&path);

    let app = find_type(&woven, "Demo.App").unwrap();
    let main = find_method(&woven, app, "Main");
    let instructions = &woven.method_def(main).unwrap().body.as_ref().unwrap().instructions;

    let branch = instructions.iter().find(|i| i.mnemonic() == "br.s").unwrap();
    let Operand::Target(target) = branch.operand else {
        panic!("branch keeps a target");
    };
    let landing = instructions
        .iter()
        .find(|i| i.offset == target)
        .expect("branch target must land on an instruction");

    // The re-entering branch counts the call again: it lands on the increment,
    // not behind it.
    assert_eq!(landing.mnemonic(), "ldsfld");
}
