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
        writeln!(self.output, ".intel_syntax noprefix")
    }

    fn operand(operand: Operand) -> String {
        match operand {
            Operand::Reg(reg) => reg.to_string(),
            Operand::Imm(value) => value.to_string(),
            Operand::Deref(reg) => format!("[{}]", reg),
        }
    }

    fn binary(&mut self, opcode: &str, dst: Operand, src: Operand) -> io::Result<()> {
        let (dst, src) = (Self::operand(dst), Self::operand(src));
        emit!(self, opcode, "{}, {}", dst, src)
    }

    fn sign_extend(&mut self) -> io::Result<()> {
        emit!(self, "cqo")
    }

    fn zero_extend(&mut self, dst: Reg, src: Reg) -> io::Result<()> {
        emit!(self, "movzx", "{}, {}", dst, src)
    }
}
