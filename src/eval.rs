//! Evaluación directa del AST.
//!
//! Este evaluador reproduce la semántica del código emitido sin pasar
//! por el ensamblador: aritmética de 64 bits con desbordamiento
//! circular, comparaciones que producen 0 o 1 y un frame de variables
//! inicializado en cero. Sirve como referencia contra la cual comparar
//! ejecutables generados.

use thiserror::Error;

use crate::{
    parse::{Ast, BinOp, Expr, FRAME_SLOTS},
    source::Located,
};

/// Condiciones que en el código emitido son comportamiento indefinido.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EvalError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Division overflow")]
    DivisionOverflow,

    #[error("Assignment target is not a variable")]
    NotAddressable,
}

pub type Eval<T> = Result<T, Located<EvalError>>;

impl Ast {
    /// Evalúa el programa y obtiene el valor de su última sentencia,
    /// o cero si no hay sentencias.
    pub fn evaluate(&self) -> Eval<i64> {
        let mut frame = Frame::default();

        let mut last = 0;
        for statement in self.statements() {
            last = frame
                .eval(statement.val())
                .map_err(|error| Located::at(error, statement.location().clone()))?;
        }

        Ok(last)
    }
}

#[derive(Default)]
struct Frame {
    slots: [i64; FRAME_SLOTS as usize],
}

impl Frame {
    fn eval(&mut self, expr: &Expr) -> Result<i64, EvalError> {
        match expr {
            Expr::Integer(value) => Ok(*value as i64),
            Expr::Read(variable) => Ok(self.slots[variable.slot()]),

            Expr::Assign(target, value) => {
                let variable = match target.as_ref() {
                    Expr::Read(variable) => *variable,
                    _ => return Err(EvalError::NotAddressable),
                };

                let value = self.eval(value)?;
                self.slots[variable.slot()] = value;

                Ok(value)
            }

            Expr::Binary(lhs, op, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;

                apply(*op, lhs, rhs)
            }
        }
    }
}

fn apply(op: BinOp, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    let result = match op {
        BinOp::Add => lhs.wrapping_add(rhs),
        BinOp::Sub => lhs.wrapping_sub(rhs),
        BinOp::Mul => lhs.wrapping_mul(rhs),
        BinOp::Div => match (lhs, rhs) {
            (_, 0) => return Err(EvalError::DivisionByZero),
            (i64::MIN, -1) => return Err(EvalError::DivisionOverflow),
            _ => lhs / rhs,
        },

        BinOp::Equal => (lhs == rhs) as i64,
        BinOp::NotEqual => (lhs != rhs) as i64,
        BinOp::Less => (lhs < rhs) as i64,
        BinOp::LessOrEqual => (lhs <= rhs) as i64,
    };

    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::{lex, parse, source::Source};

    use super::*;

    fn run(text: &str) -> Eval<i64> {
        let source = Source::new("<test>", text);
        let tokens = lex::tokenize(&source).unwrap();

        parse::parse(&tokens).unwrap().evaluate()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(run("1+2*3;").unwrap(), 7);
        assert_eq!(run("(1+2)*3;").unwrap(), 9);
        assert_eq!(run("8-3-2;").unwrap(), 3);
        assert_eq!(run("100/10/5;").unwrap(), 2);
    }

    #[test]
    fn comparisons() {
        assert_eq!(run("1<2;").unwrap(), 1);
        assert_eq!(run("2<1;").unwrap(), 0);
        assert_eq!(run("2<=2;").unwrap(), 1);
        assert_eq!(run("3>2;").unwrap(), 1);
        assert_eq!(run("2>=3;").unwrap(), 0);
        assert_eq!(run("1+1==2;").unwrap(), 1);
        assert_eq!(run("1!=1;").unwrap(), 0);
    }

    #[test]
    fn variables() {
        assert_eq!(run("a=3;b=4;a+b;").unwrap(), 7);
        assert_eq!(run("a=3;a=5;a;").unwrap(), 5);
        assert_eq!(run("a=b=2;a*b;").unwrap(), 4);
        assert_eq!(run("q;").unwrap(), 0);
    }

    #[test]
    fn last_statement_wins() {
        assert_eq!(run("1;2;3;").unwrap(), 3);
        assert_eq!(run("").unwrap(), 0);
    }

    #[test]
    fn negation_and_truncating_division() {
        assert_eq!(run("-7/2;").unwrap(), -3);
        assert_eq!(run("-(3-10);").unwrap(), 7);
    }

    #[test]
    fn division_by_zero_is_located() {
        let error = run("a=1;\na/(a-1);").unwrap_err();

        assert_eq!(*error.val(), EvalError::DivisionByZero);
        assert_eq!(error.location().start().line(), 2);
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(
            run("a=2147483647*2147483647*2147483647;a;").unwrap(),
            (i32::MAX as i64)
                .wrapping_mul(i32::MAX as i64)
                .wrapping_mul(i32::MAX as i64)
        );
    }
}
