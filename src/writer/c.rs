//! Emit the `plop_op.inc` opcode table shared with the C++ runtime.

use crate::processor::opcode::OpcodeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub const INC_NAME: &str = "plop_op.inc";

/// Writes the table in the `PLOP_OP(NAME, VALUE)` form read back by
/// `OpcodeMap::from_inc`.
pub fn write_inc(map: &OpcodeMap, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "// Auto-generated – DO NOT EDIT")?;
    writeln!(out, "// #define PLOP_OP(name, value) before including\n")?;
    for (op, word) in map.entries() {
        writeln!(out, "PLOP_OP({}, {})", op.name(), word)?;
    }
    Ok(())
}

pub fn emit(map: &OpcodeMap, out_dir: &Path) -> io::Result<()> {
    let mut inc = File::create(out_dir.join(INC_NAME))?;
    write_inc(map, &mut inc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::opcode::Op;

    #[test]
    fn test_inc_reloads_to_same_map() {
        let map = OpcodeMap::default();
        let mut text = Vec::new();
        write_inc(&map, &mut text).unwrap();
        let text = String::from_utf8(text).unwrap();

        assert!(text.contains("PLOP_OP(BEGIN, 100)\n"));
        assert!(text.contains("PLOP_OP(NE, 113)\n"));
        assert_eq!(OpcodeMap::from_inc(&text).unwrap(), map);
    }

    #[test]
    fn test_inc_is_sorted_by_value() {
        let mut text = Vec::new();
        write_inc(&OpcodeMap::default(), &mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        let names: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("PLOP_OP("))
            .filter_map(|l| l.split(',').next())
            .collect();
        assert_eq!(names.len(), Op::ALL.len());
        assert_eq!(names.first(), Some(&"BEGIN"));
        assert_eq!(names.last(), Some(&"LGET"));
    }
}
