//! Compilador de expresiones aritméticas a ensamblador x86-64.
//!
//! # Front end
//! Cada programa es un único texto fuente. Este texto se somete
//! primero a análisis léxico en [`lex`], de lo cual se obtiene un
//! flujo de tokens. El flujo de tokens se dispone en un AST por medio
//! de análisis sintáctico en [`parse`], fase que además resuelve cada
//! variable a una posición fija del stack frame.
//!
//! # Back end
//! El AST se traduce directamente a texto ensamblador en
//! [`target`], siguiendo una disciplina de máquina de pila, en el
//! dialecto de ensamblador que se elija. El resultado es una única
//! rutina `main` cuyo valor de retorno es el de la última sentencia.
//! El ensamblado y enlazado se delegan al compilador de C del sistema
//! en [`link`]. Para propósitos de verificación, [`eval`] calcula el
//! mismo resultado sin generar código.

#[macro_use]
mod macros;

pub mod error;
pub mod eval;
pub mod lex;
pub mod link;
pub mod parse;
pub mod source;

mod arch;
mod codegen;

use std::rc::Rc;

use crate::{error::Diagnostics, parse::Ast, source::Source};

/// Emisión de código.
///
/// Este módulo reexporta suficientes ítems internos relacionados a generación de código para
/// traducir un AST a texto ensamblador.
pub mod target {
    pub use crate::arch::Syntax;
    pub use crate::codegen::{emit, CodegenError, ENTRY};
}

/// Ejecuta las fases delanteras: análisis léxico y sintáctico.
///
/// El primer error encontrado aborta la compilación.
pub fn frontend(source: &Rc<Source>) -> Result<Ast, Diagnostics> {
    let tokens = lex::tokenize(source).map_err(|error| Diagnostics::from(error).kind("Lexical error"))?;
    let ast = parse::parse(&tokens).map_err(|error| Diagnostics::from(error).kind("Syntax error"))?;

    Ok(ast)
}
