use std::fs;

use plopc::model::{ALIGN, HEADER_SIZE};
use plopc::processor::blob::ScriptUnit;
use plopc::processor::disasm::decode;
use plopc::processor::opcode::{Op, OpcodeMap};
use plopc::processor::strings::StringLookup;
use plopc::reader::{self, Container, ScriptView};
use plopc::writer::bin::Exporter;

fn compile(src: &str) -> (ScriptUnit, Vec<u8>) {
    let unit = ScriptUnit::compile(src, &OpcodeMap::default());
    let bytes = unit.to_bytes().expect("layout");
    (unit, bytes)
}

fn script_view(bytes: &[u8]) -> ScriptView<'_> {
    match reader::read(bytes).expect("valid container") {
        Container::Script(view) => view,
        other => panic!("expected a script container, got {other:?}"),
    }
}

fn word(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

#[test]
fn compiles_fixture() {
    let src = fs::read_to_string("tests/data/intro.plop").unwrap();
    let (unit, bytes) = compile(&src);
    assert!(unit.diagnostics().is_empty(), "{:?}", unit.diagnostics());

    let view = script_view(&bytes);
    assert_eq!(view.blocks.len(), 6);
    assert_eq!(
        view.strings.iter().collect::<Vec<_>>(),
        vec![
            "visits",
            "say",
            "Welcome back!",
            "Hello, stranger.",
            "inventory",
            "sword",
            "fade",
        ]
    );
}

#[test]
fn blocks_are_aligned() {
    let src = fs::read_to_string("tests/data/intro.plop").unwrap();
    let (unit, bytes) = compile(&src);
    let info = HEADER_SIZE as usize;
    for i in 0..unit.blocks().len() {
        let at = word(&bytes, info + 12 + i * 8) as usize;
        assert_eq!(at % ALIGN, 0, "block {i} at {at}");
    }
    let strs = word(&bytes, 16) as usize;
    assert_eq!(strs % ALIGN, 0);
}

#[test]
fn if_offsets_point_at_branches() {
    let (_, bytes) = compile("(if (> x 1) (+ x 1) (- x 1))");
    let code = &script_view(&bytes).blocks[0];

    assert_eq!(code[2], Op::If as u32);
    let (then_at, else_at) = (code[3] as usize, code[4] as usize);
    assert_eq!((then_at, else_at), (14, 23));

    // both branches are emitted, each starting with its frame bracket
    assert_eq!(code[then_at], Op::Begin as u32);
    assert_eq!(code[then_at + 2], Op::Add as u32);
    assert_eq!(code[else_at], Op::Begin as u32);
    assert_eq!(code[else_at + 2], Op::Sub as u32);
}

#[test]
fn write_ids_follow_first_reference_across_blocks() {
    let (_, bytes) = compile("(list \"a\" \"b\")\n(list \"b\" \"c\")");
    let view = script_view(&bytes);
    assert_eq!(view.strings.iter().collect::<Vec<_>>(), vec!["a", "b", "c"]);

    let sval_operands = |code: &[u32]| -> Vec<u32> {
        decode(code, &OpcodeMap::default())
            .unwrap()
            .into_iter()
            .filter(|ins| ins.op == Op::Sval)
            .map(|ins| ins.operands[0])
            .collect()
    };
    assert_eq!(sval_operands(&view.blocks[0]), vec![0, 1]);
    assert_eq!(sval_operands(&view.blocks[1]), vec![1, 2]);
}

#[test]
fn literals() {
    let (_, bytes) = compile("(f 3.5 \"hi\")");
    let view = script_view(&bytes);
    let ins = decode(&view.blocks[0], &OpcodeMap::default()).unwrap();

    let fval = ins.iter().find(|i| i.op == Op::Fval).unwrap();
    assert_eq!(fval.operands, vec![0x4060_0000]);

    let sval = ins.iter().find(|i| i.op == Op::Sval).unwrap();
    assert_eq!(view.strings.lookup(sval.operands[0]), Some("hi"));
}

#[test]
fn output_is_deterministic() {
    let src = fs::read_to_string("tests/data/intro.plop").unwrap();
    let (_, first) = compile(&src);
    let (_, second) = compile(&src);
    assert_eq!(first, second);
}

#[test]
fn bad_lines_do_not_stop_the_unit() {
    let (unit, bytes) = compile("(f 1\n(g 2)\n(defvar 3 4)\n(h 3)");
    assert_eq!(unit.diagnostics().len(), 2);
    assert_eq!(script_view(&bytes).blocks.len(), 2);
}

#[test]
fn remapped_opcodes_change_only_opcode_words() {
    let inc: String = Op::ALL
        .iter()
        .enumerate()
        .map(|(i, op)| format!("PLOP_OP({}, {})\n", op.name(), 200 + i))
        .collect();
    let map = OpcodeMap::from_inc(&inc).unwrap();
    let unit = ScriptUnit::compile("(if c 1 2)", &map);
    let bytes = unit.to_bytes().unwrap();
    let code = &script_view(&bytes).blocks[0];

    assert_eq!(code[0], 200);
    assert_eq!(code[2], 207);
    assert_eq!(decode(code, &map).unwrap().len(), 6);
    assert!(decode(code, &OpcodeMap::default()).is_err());
}
