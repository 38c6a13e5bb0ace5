use proptest::prelude::*;
use trigscript::interpreter::{CompileErrorKind, Position, Script};

#[test]
fn same_source_compiles_to_equal_trees() {
    let source = "let total = 0\nfor i in 0..3 {\n  total = total + i\n}\n#Message total";
    let first = Script::compile(source).unwrap();
    let second = Script::compile(source).unwrap();
    assert_eq!(first.program(), second.program());
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn bad_character_is_a_lex_error() {
    let err = Script::compile("x = 1\ny = 2 @ 3").unwrap_err();
    assert_eq!(err.kind(), CompileErrorKind::Lex);
    assert_eq!(err.position(), Position::new(2, 7));
}

#[test]
fn misplaced_token_is_a_parse_error() {
    let err = Script::compile("if x {\n  #Message\n} else").unwrap_err();
    assert_eq!(err.kind(), CompileErrorKind::Parse);
    assert_eq!(err.position().line, 3);
}

#[test]
fn loop_control_outside_a_loop_is_rejected() {
    let err = Script::compile("break").unwrap_err();
    assert_eq!(err.kind(), CompileErrorKind::Parse);
    assert_eq!(err.position(), Position::new(1, 1));
}

#[test]
fn syntax_tree_serializes_to_json() {
    let script = Script::compile("#Message \"hi\", 1 + 2").unwrap();
    let json = serde_json::to_value(script.program()).unwrap();
    assert!(json["statements"].is_array());
    assert_eq!(json["statements"].as_array().map(Vec::len), Some(1));
}

proptest! {
    #[test]
    fn compile_is_deterministic(name in "[a-z][a-z0-9_]{0,8}", n in any::<i32>()) {
        prop_assume!(!matches!(
            name.as_str(),
            "let" | "if" | "else" | "while" | "for" | "in" | "break" | "continue"
                | "cooldown" | "true" | "false" | "null" | "global"
        ));
        let source = format!("let {name} = {n}\nglobal.{name} = {name} * 2");
        let first = Script::compile(source.clone()).unwrap();
        let second = Script::compile(source).unwrap();
        prop_assert_eq!(first.program(), second.program());
    }

    #[test]
    fn compile_never_panics(source in "\\PC{0,64}") {
        let _ = Script::compile(source);
    }
}
