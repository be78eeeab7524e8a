//! Dialectos de ensamblador x86-64.
//!
//! La secuencia de instrucciones es la misma sin importar el dialecto;
//! lo único que varía es la forma de escribir operandos, el orden de
//! los mismos y algunos mnemónicos. Cada dialecto implementa
//! [`Emitter`] y debe accederse por medio de `dispatch_syntax!()`.

use std::{
    fmt::{self, Display},
    io::{self, Write},
    str::FromStr,
};

mod att;
mod intel;

pub use att::Emitter as Att;
pub use intel::Emitter as Intel;

/// Dialecto de ensamblador.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Syntax {
    /// `.intel_syntax noprefix`: destino primero, sin sigilos.
    Intel,

    /// Sintaxis AT&T de GNU as: fuente primero, `%` y `$`.
    Att,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax::Intel
    }
}

impl FromStr for Syntax {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "intel" => Ok(Syntax::Intel),
            "att" => Ok(Syntax::Att),
            _ => Err(()),
        }
    }
}

impl Display for Syntax {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Syntax::Intel => formatter.write_str("intel"),
            Syntax::Att => formatter.write_str("att"),
        }
    }
}

/// Registros que intervienen en la máquina de pila.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rdi,
    Rbp,
    Rsp,

    /// Byte bajo de `rax`, destino de `setcc`.
    Al,
}

impl Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Reg::*;

        let name = match self {
            Rax => "rax",
            Rdi => "rdi",
            Rbp => "rbp",
            Rsp => "rsp",
            Al => "al",
        };

        formatter.write_str(name)
    }
}

/// Operando de instrucción, independiente de dialecto.
#[derive(Copy, Clone, Debug)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),

    /// Memoria en la dirección contenida por un registro.
    Deref(Reg),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

/// Emisión de texto ensamblador en un dialecto particular.
pub trait Emitter<'a>: Sized {
    /// Construye a partir de la salida a la que se escribirá.
    fn new(output: &'a mut dyn Write) -> Self;

    /// Obtiene la salida.
    fn output(&mut self) -> &mut dyn Write;

    /// Directiva que selecciona el dialecto.
    fn directive(&mut self) -> io::Result<()>;

    /// Escribe un operando.
    fn operand(operand: Operand) -> String;

    /// Instrucción de dos operandos, expresada en orden destino-fuente.
    fn binary(&mut self, opcode: &str, dst: Operand, src: Operand) -> io::Result<()>;

    /// Extiende el signo de `rax` hacia `rdx`, previo a `idiv`.
    fn sign_extend(&mut self) -> io::Result<()>;

    /// Extiende con ceros un registro de un byte a uno de 64 bits.
    fn zero_extend(&mut self, dst: Reg, src: Reg) -> io::Result<()>;

    /// Instrucción de un operando.
    fn unary(&mut self, opcode: &str, operand: Operand) -> io::Result<()> {
        let operand = Self::operand(operand);
        emit!(self, opcode, "{}", operand)
    }

    /// Instrucción sin operandos.
    fn nullary(&mut self, opcode: &str) -> io::Result<()> {
        emit!(self, opcode)
    }

    /// Declara un símbolo global y coloca su etiqueta.
    fn global_label(&mut self, symbol: &str) -> io::Result<()> {
        writeln!(self.output(), ".globl {0}\n{0}:", symbol)
    }
}
