//! Generación de código.
//!
//! El AST se recorre en post-orden y se traduce a una máquina de pila:
//! cada expresión deja exactamente un valor de 64 bits en el tope de
//! la pila del procesador, y cada operación binaria consume dos y
//! produce uno. Las variables residen en un stack frame de tamaño fijo
//! direccionado relativo a `rbp`.

use crate::{
    arch::{Emitter, Operand, Reg, Syntax},
    parse::{Ast, BinOp, Expr, Variable, FRAME_SLOTS, SLOT_SIZE},
    source::Location,
};

use std::io::{self, Write};
use thiserror::Error;

/// Símbolo de la rutina emitida.
pub const ENTRY: &str = "main";

/// Error de generación de código.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("I/O error")]
    Io(#[from] io::Error),

    /// El AST viola una precondición que el parser debió garantizar.
    #[error("Internal error: assignment target is not a variable, in statement at {0}")]
    NotAddressable(Location),
}

/// Emite la rutina completa en el dialecto indicado.
pub fn emit(ast: &Ast, syntax: Syntax, output: &mut dyn Write) -> Result<(), CodegenError> {
    dispatch_syntax!(E: syntax => {
        let mut emitter = E::new(output);
        routine(&mut emitter, ast)
    })?;

    tracing::debug!(%syntax, statements = ast.statements().len(), "emitted `{}`", ENTRY);
    Ok(())
}

fn routine<'a, E: Emitter<'a>>(cx: &mut E, ast: &Ast) -> Result<(), CodegenError> {
    use Operand::Imm;
    use Reg::*;

    cx.directive()?;
    cx.global_label(ENTRY)?;

    // Prólogo, crea un stack frame con espacio para todas las variables
    cx.unary("push", Rbp.into())?;
    cx.binary("mov", Rbp.into(), Rsp.into())?;
    cx.binary("sub", Rsp.into(), Imm((FRAME_SLOTS * SLOT_SIZE) as i64))?;

    // Cada sentencia deja su valor en la pila. Se descarta a `rax`,
    // por lo que al final `rax` contiene el valor de la última
    for statement in ast.statements() {
        tracing::trace!("statement at {}", statement.location());

        expr(cx, statement.val(), statement.location())?;

        cx.unary("pop", Rax.into())?;
    }

    if ast.statements().is_empty() {
        cx.binary("mov", Rax.into(), Imm(0))?;
    }

    // Epílogo, revierte al estado justo antes de la llamada
    cx.binary("mov", Rsp.into(), Rbp.into())?;
    cx.unary("pop", Rbp.into())?;
    cx.nullary("ret")?;

    Ok(())
}

fn expr<'a, E: Emitter<'a>>(cx: &mut E, node: &Expr, at: &Location) -> Result<(), CodegenError> {
    use Operand::{Deref, Imm};
    use Reg::*;

    match node {
        Expr::Integer(value) => cx.unary("push", Imm(*value as i64))?,

        Expr::Read(variable) => {
            address(cx, variable)?;
            cx.unary("pop", Rax.into())?;
            cx.binary("mov", Rax.into(), Deref(Rax))?;
            cx.unary("push", Rax.into())?;
        }

        Expr::Assign(target, value) => {
            match target.as_ref() {
                Expr::Read(variable) => address(cx, variable)?,
                _ => return Err(CodegenError::NotAddressable(at.clone())),
            }

            expr(cx, value, at)?;

            cx.unary("pop", Rdi.into())?;
            cx.unary("pop", Rax.into())?;
            cx.binary("mov", Deref(Rax), Rdi.into())?;
            cx.unary("push", Rdi.into())?;
        }

        Expr::Binary(lhs, op, rhs) => {
            expr(cx, lhs, at)?;
            expr(cx, rhs, at)?;

            cx.unary("pop", Rdi.into())?;
            cx.unary("pop", Rax.into())?;
            operate(cx, *op)?;
            cx.unary("push", Rax.into())?;
        }
    }

    Ok(())
}

/// Aplica un operador con el operando izquierdo en `rax` y el derecho
/// en `rdi`, dejando el resultado en `rax`.
fn operate<'a, E: Emitter<'a>>(cx: &mut E, op: BinOp) -> io::Result<()> {
    use Reg::*;

    let set = match op {
        BinOp::Add => return cx.binary("add", Rax.into(), Rdi.into()),
        BinOp::Sub => return cx.binary("sub", Rax.into(), Rdi.into()),
        BinOp::Mul => return cx.binary("imul", Rax.into(), Rdi.into()),
        BinOp::Div => {
            cx.sign_extend()?;
            return cx.unary("idiv", Rdi.into());
        }

        BinOp::Equal => "sete",
        BinOp::NotEqual => "setne",
        BinOp::Less => "setl",
        BinOp::LessOrEqual => "setle",
    };

    cx.binary("cmp", Rax.into(), Rdi.into())?;
    cx.unary(set, Al.into())?;
    cx.zero_extend(Rax, Al)
}

/// Empuja la dirección de una variable: `rbp - offset`.
fn address<'a, E: Emitter<'a>>(cx: &mut E, variable: &Variable) -> io::Result<()> {
    use Reg::*;

    cx.binary("mov", Rax.into(), Rbp.into())?;
    cx.binary("sub", Rax.into(), Operand::Imm(variable.offset() as i64))?;
    cx.unary("push", Rax.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lex, parse,
        source::{Located, Source},
    };

    fn compile(text: &str, syntax: Syntax) -> String {
        let source = Source::new("<test>", text);
        let tokens = lex::tokenize(&source).unwrap();
        let ast = parse::parse(&tokens).unwrap();

        let mut output = Vec::new();
        emit(&ast, syntax, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    fn instructions(asm: &str) -> Vec<String> {
        asm.lines()
            .filter(|line| line.starts_with('\t'))
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect()
    }

    #[test]
    fn routine_layout() {
        let asm = compile("1;", Syntax::Intel);
        let mut lines = asm.lines();

        assert_eq!(lines.next(), Some(".intel_syntax noprefix"));
        assert_eq!(lines.next(), Some(".globl main"));
        assert_eq!(lines.next(), Some("main:"));

        assert_eq!(
            instructions(&asm),
            vec![
                "push rbp",
                "mov rbp, rsp",
                "sub rsp, 208",
                "push 1",
                "pop rax",
                "mov rsp, rbp",
                "pop rbp",
                "ret",
            ]
        );
    }

    #[test]
    fn att_operands_are_reversed() {
        let asm = compile("a = 2 < 3;", Syntax::Att);
        let instructions = instructions(&asm);

        assert!(asm.starts_with(".att_syntax\n"));
        assert!(instructions.contains(&"sub $208, %rsp".to_owned()));
        assert!(instructions.contains(&"sub $8, %rax".to_owned()));
        assert!(instructions.contains(&"cmp %rdi, %rax".to_owned()));
        assert!(instructions.contains(&"movzbq %al, %rax".to_owned()));
        assert!(instructions.contains(&"mov %rdi, (%rax)".to_owned()));
    }

    #[test]
    fn assignment_stores_through_address() {
        let asm = compile("b = 1; b;", Syntax::Intel);
        let instructions = instructions(&asm);

        let store = [
            "mov rax, rbp",
            "sub rax, 8",
            "push rax",
            "push 1",
            "pop rdi",
            "pop rax",
            "mov [rax], rdi",
            "push rdi",
        ];
        assert_eq!(&instructions[3..11], &store[..]);

        let load = ["mov rax, rbp", "sub rax, 8", "push rax", "pop rax", "mov rax, [rax]"];
        assert_eq!(&instructions[12..17], &load[..]);
    }

    #[test]
    fn division_extends_sign() {
        let instructions = instructions(&compile("7/2;", Syntax::Intel));
        let at = instructions.iter().position(|line| line == "cqo").unwrap();

        assert_eq!(instructions[at + 1], "idiv rdi");
    }

    #[test]
    fn stack_is_balanced() {
        for text in ["", "1;", "1+2*3;", "a=b=3; a<=b; (a-1)/2 != b;", "1;2;3;"] {
            let instructions = instructions(&compile(text, Syntax::Intel));
            let pushes = instructions.iter().filter(|i| i.starts_with("push")).count();
            let pops = instructions.iter().filter(|i| i.starts_with("pop")).count();

            assert_eq!(pushes, pops, "unbalanced stack for {:?}", text);
        }
    }

    #[test]
    fn empty_program_returns_zero() {
        let instructions = instructions(&compile("", Syntax::Intel));
        assert!(instructions.contains(&"mov rax, 0".to_owned()));
    }

    #[test]
    fn malformed_assignment_is_internal_error() {
        let source = Source::new("<test>", "1=2;");
        let location = Location::new(&source, 0, 4);

        let bad = Expr::assign(Expr::Integer(1), Expr::Integer(2));
        let ast = parse::Ast::new(vec![Located::at(bad, location)], 0);

        let mut output = Vec::new();
        let error = emit(&ast, Syntax::Intel, &mut output).unwrap_err();

        assert!(matches!(error, CodegenError::NotAddressable(ref at) if at.offset() == 0));
    }
}
