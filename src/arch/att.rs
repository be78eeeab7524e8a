use super::{Emitter as _, Operand, Reg};
use std::io::{self, Write};

pub struct Emitter<'a> {
    output: &'a mut dyn Write,
}

impl<'a> super::Emitter<'a> for Emitter<'a> {
    fn new(output: &'a mut dyn Write) -> Self {
        Emitter { output }
    }

    fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    fn directive(&mut self) -> io::Result<()> {
        writeln!(self.output, ".att_syntax")
    }

    fn operand(operand: Operand) -> String {
        match operand {
            Operand::Reg(reg) => format!("%{}", reg),
            Operand::Imm(value) => format!("${}", value),
            Operand::Deref(reg) => format!("(%{})", reg),
        }
    }

    fn binary(&mut self, opcode: &str, dst: Operand, src: Operand) -> io::Result<()> {
        // AT&T invierte el orden: fuente primero
        let (dst, src) = (Self::operand(dst), Self::operand(src));
        emit!(self, opcode, "{}, {}", src, dst)
    }

    fn sign_extend(&mut self) -> io::Result<()> {
        emit!(self, "cqto")
    }

    fn zero_extend(&mut self, dst: Reg, src: Reg) -> io::Result<()> {
        emit!(self, "movzbq", "%{}, %{}", src, dst)
    }
}
