//! Análisis sintáctico.
//!
//! El parser es de descenso recursivo con una regla por nivel de
//! precedencia. Consume el flujo de tokens con un único cursor que
//! nunca retrocede y, en el camino, asigna a cada variable una
//! posición fija en el stack frame de la rutina emitida.

use std::fmt::{self, Display};
use thiserror::Error;

use crate::{
    lex::{Punct, Token},
    source::{Located, Location},
};

/// Tamaño de una posición del stack frame, en bytes.
pub const SLOT_SIZE: u32 = 8;

/// Cantidad de posiciones del stack frame, una por cada letra minúscula.
pub const FRAME_SLOTS: u32 = 26;

/// Programa completo: una secuencia ordenada de sentencias.
///
/// Cada sentencia es un árbol de expresión completo. Al ejecutarse,
/// el valor de la última sentencia es el resultado de la rutina.
#[derive(Debug)]
pub struct Ast {
    statements: Vec<Located<Expr>>,
    slots: u32,
}

impl Ast {
    /// Construye un programa a partir de sentencias ya resueltas.
    pub fn new(statements: Vec<Located<Expr>>, slots: u32) -> Self {
        Ast { statements, slots }
    }

    /// Sentencias en orden de ejecución.
    pub fn statements(&self) -> &[Located<Expr>] {
        &self.statements
    }

    /// Cantidad de variables distintas que el programa utiliza.
    pub fn slots(&self) -> u32 {
        self.slots
    }
}

/// Nodo de expresión.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Integer(i32),
    Read(Variable),
    Assign(Box<Expr>, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

impl Expr {
    pub fn binary(lhs: Expr, op: BinOp, rhs: Expr) -> Self {
        Expr::Binary(Box::new(lhs), op, Box::new(rhs))
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign(Box::new(target), Box::new(value))
    }
}

/// Operadores binarios.
///
/// `>` y `>=` no tienen representación propia: el parser los reescribe
/// como `<` y `<=` con los operandos intercambiados.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;

        let string = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
        };

        fmt.write_str(string)
    }
}

/// Una variable resuelta a su posición en el stack frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    name: char,
    offset: u32,
}

impl Variable {
    /// Nombre original.
    pub fn name(&self) -> char {
        self.name
    }

    /// Desplazamiento en bytes hacia abajo desde la base del frame.
    ///
    /// Siempre es positivo y múltiplo de [`SLOT_SIZE`].
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Índice de la posición que ocupa, a partir de cero.
    pub fn slot(&self) -> usize {
        (self.offset / SLOT_SIZE - 1) as usize
    }
}

/// Tabla de símbolos.
///
/// Asocia nombres con posiciones del frame en orden de aparición. Una
/// vez asignada, una posición no cambia durante la compilación.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Variable>,
}

impl SymbolTable {
    /// Resuelve un nombre, reservando la siguiente posición libre
    /// si es la primera vez que se observa.
    pub fn resolve(&mut self, name: char) -> Variable {
        if let Some(variable) = self.symbols.iter().find(|var| var.name == name) {
            return *variable;
        }

        let variable = Variable {
            name,
            offset: (self.symbols.len() as u32 + 1) * SLOT_SIZE,
        };

        self.symbols.push(variable);
        variable
    }

    /// Cantidad de posiciones en uso.
    pub fn len(&self) -> u32 {
        self.symbols.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected a number, identifier or `(`, found {0} instead")]
    ExpectedExpr(Token),

    #[error("Invalid assignment target, only variables can be assigned")]
    InvalidTarget,
}

pub type Parse<T> = Result<T, Located<ParserError>>;

/// Construye el AST de un flujo de tokens terminado en [`Token::Eof`].
pub fn parse(tokens: &[Located<Token>]) -> Parse<Ast> {
    let mut parser = Parser {
        tokens,
        cursor: 0,
        symbols: SymbolTable::default(),
    };

    let ast = parser.program()?;
    tracing::debug!(
        statements = ast.statements().len(),
        slots = ast.slots(),
        "parsed program"
    );

    Ok(ast)
}

/// Estado del parser: cursor y tabla de símbolos.
struct Parser<'a> {
    tokens: &'a [Located<Token>],
    cursor: usize,
    symbols: SymbolTable,
}

impl Parser<'_> {
    fn program(&mut self) -> Parse<Ast> {
        let mut statements = Vec::new();
        while *self.peek() != Token::Eof {
            statements.push(self.statement()?);
        }

        let slots = self.symbols.len();
        Ok(Ast::new(statements, slots))
    }

    fn statement(&mut self) -> Parse<Located<Expr>> {
        let start = self.location();
        let expr = self.expr()?;
        let end = self.location();
        self.expect(Punct::Semicolon)?;

        Ok(Located::at(expr, Location::span(start, &end)))
    }

    fn expr(&mut self) -> Parse<Expr> {
        self.assign()
    }

    fn assign(&mut self) -> Parse<Expr> {
        let target = self.equality()?;

        let assign = self.location();
        if !self.accept(Punct::Assign) {
            return Ok(target);
        }

        if !matches!(target, Expr::Read(_)) {
            return Err(Located::at(ParserError::InvalidTarget, assign));
        }

        // Asociatividad por la derecha: `a = b = 1` es `a = (b = 1)`
        let value = self.assign()?;
        Ok(Expr::assign(target, value))
    }

    fn equality(&mut self) -> Parse<Expr> {
        let mut node = self.relational()?;

        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Equal) => BinOp::Equal,
                Token::Punct(Punct::NotEqual) => BinOp::NotEqual,
                _ => break Ok(node),
            };

            self.advance();
            node = Expr::binary(node, op, self.relational()?);
        }
    }

    fn relational(&mut self) -> Parse<Expr> {
        let mut node = self.additive()?;

        loop {
            // `a > b` equivale a `b < a`, de igual forma para `>=`
            let (op, swap) = match self.peek() {
                Token::Punct(Punct::Less) => (BinOp::Less, false),
                Token::Punct(Punct::LessOrEqual) => (BinOp::LessOrEqual, false),
                Token::Punct(Punct::Greater) => (BinOp::Less, true),
                Token::Punct(Punct::GreaterOrEqual) => (BinOp::LessOrEqual, true),
                _ => break Ok(node),
            };

            self.advance();
            let rhs = self.additive()?;

            node = if swap {
                Expr::binary(rhs, op, node)
            } else {
                Expr::binary(node, op, rhs)
            };
        }
    }

    fn additive(&mut self) -> Parse<Expr> {
        let mut node = self.term()?;

        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Plus) => BinOp::Add,
                Token::Punct(Punct::Minus) => BinOp::Sub,
                _ => break Ok(node),
            };

            self.advance();
            node = Expr::binary(node, op, self.term()?);
        }
    }

    fn term(&mut self) -> Parse<Expr> {
        let mut node = self.unary()?;

        loop {
            let op = match self.peek() {
                Token::Punct(Punct::Times) => BinOp::Mul,
                Token::Punct(Punct::Slash) => BinOp::Div,
                _ => break Ok(node),
            };

            self.advance();
            node = Expr::binary(node, op, self.unary()?);
        }
    }

    fn unary(&mut self) -> Parse<Expr> {
        if self.accept(Punct::Plus) {
            self.primary()
        } else if self.accept(Punct::Minus) {
            // No hay negación nativa: `-x` es `0 - x`
            let operand = self.primary()?;
            Ok(Expr::binary(Expr::Integer(0), BinOp::Sub, operand))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Parse<Expr> {
        let (location, token) = self.next().split();

        match token {
            Token::IntLiteral(integer) => Ok(Expr::Integer(integer)),
            Token::Id(name) => Ok(Expr::Read(self.symbols.resolve(name))),

            Token::Punct(Punct::OpenParen) => {
                let expr = self.expr()?;
                self.expect(Punct::CloseParen)?;
                Ok(expr)
            }

            found => Err(Located::at(ParserError::ExpectedExpr(found), location)),
        }
    }

    fn expect(&mut self, punct: Punct) -> Parse<()> {
        if self.accept(punct) {
            Ok(())
        } else {
            let found = *self.peek();
            let error = ParserError::UnexpectedToken(Token::Punct(punct), found);

            Err(Located::at(error, self.location()))
        }
    }

    fn accept(&mut self, punct: Punct) -> bool {
        let matches = *self.peek() == Token::Punct(punct);
        if matches {
            self.advance();
        }

        matches
    }

    fn next(&mut self) -> Located<Token> {
        let token = self.current().clone();
        self.advance();

        token
    }

    fn peek(&self) -> &Token {
        self.current().val()
    }

    fn location(&self) -> Location {
        self.current().location().clone()
    }

    fn current(&self) -> &Located<Token> {
        // El último token siempre es `Eof`, el cursor nunca lo rebasa
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex, source::Source};

    fn parse_str(text: &str) -> Parse<Ast> {
        let source = Source::new("<test>", text);
        let tokens = lex::tokenize(&source).expect("lexical error in test input");

        parse(&tokens)
    }

    fn single(text: &str) -> Expr {
        let ast = parse_str(text).unwrap();
        assert_eq!(ast.statements().len(), 1);

        ast.statements()[0].val().clone()
    }

    fn int(value: i32) -> Expr {
        Expr::Integer(value)
    }

    #[test]
    fn multiplication_binds_tighter() {
        assert_eq!(
            single("1+2*3;"),
            Expr::binary(int(1), BinOp::Add, Expr::binary(int(2), BinOp::Mul, int(3)))
        );
    }

    #[test]
    fn subtraction_is_left_deep() {
        assert_eq!(
            single("8-3-2;"),
            Expr::binary(Expr::binary(int(8), BinOp::Sub, int(3)), BinOp::Sub, int(2))
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            single("(1+2)*3;"),
            Expr::binary(Expr::binary(int(1), BinOp::Add, int(2)), BinOp::Mul, int(3))
        );
    }

    #[test]
    fn greater_swaps_operands() {
        assert_eq!(single("1>2;"), Expr::binary(int(2), BinOp::Less, int(1)));
        assert_eq!(
            single("1>=2;"),
            Expr::binary(int(2), BinOp::LessOrEqual, int(1))
        );
    }

    #[test]
    fn comparisons_below_arithmetic() {
        assert_eq!(
            single("1+1==2<3;"),
            Expr::binary(
                Expr::binary(int(1), BinOp::Add, int(1)),
                BinOp::Equal,
                Expr::binary(int(2), BinOp::Less, int(3)),
            )
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(single("+5;"), int(5));
        assert_eq!(single("-5;"), Expr::binary(int(0), BinOp::Sub, int(5)));
    }

    #[test]
    fn assignment_is_right_associative() {
        let ast = parse_str("a=b=1;").unwrap();
        let expr = ast.statements()[0].val();

        let (a, b) = match expr {
            Expr::Assign(a, rest) => match rest.as_ref() {
                Expr::Assign(b, one) => {
                    assert_eq!(**one, int(1));
                    (a.as_ref().clone(), b.as_ref().clone())
                }
                other => panic!("expected nested assignment, got {:?}", other),
            },
            other => panic!("expected assignment, got {:?}", other),
        };

        assert!(matches!(a, Expr::Read(var) if var.name() == 'a' && var.offset() == 8));
        assert!(matches!(b, Expr::Read(var) if var.name() == 'b' && var.offset() == 16));
        assert_eq!(ast.slots(), 2);
    }

    #[test]
    fn slots_follow_first_sight() {
        let ast = parse_str("z=1;a=2;z=3;z+a;").unwrap();
        let offsets: Vec<_> = ast
            .statements()
            .iter()
            .filter_map(|stmt| match stmt.val() {
                Expr::Assign(target, _) => match target.as_ref() {
                    Expr::Read(var) => Some((var.name(), var.offset(), var.slot())),
                    _ => None,
                },
                _ => None,
            })
            .collect();

        assert_eq!(offsets, vec![('z', 8, 0), ('a', 16, 1), ('z', 8, 0)]);
        assert_eq!(ast.slots(), 2);
    }

    #[test]
    fn empty_program() {
        let ast = parse_str("  ").unwrap();
        assert!(ast.statements().is_empty());
        assert_eq!(ast.slots(), 0);
    }

    #[test]
    fn statement_locations() {
        let ast = parse_str("1; a = 2 ;").unwrap();
        let texts: Vec<_> = ast
            .statements()
            .iter()
            .map(|stmt| stmt.location().text().to_owned())
            .collect();

        assert_eq!(texts, vec!["1;", "a = 2 ;"]);
    }

    #[test]
    fn missing_semicolon_at_eof() {
        let error = parse_str("1+2").unwrap_err();

        assert_eq!(error.location().offset(), 3);
        assert!(matches!(
            error.val(),
            ParserError::UnexpectedToken(Token::Punct(Punct::Semicolon), Token::Eof)
        ));
        assert_eq!(
            error.val().to_string(),
            "Expected `;`, found end of input instead"
        );
    }

    #[test]
    fn missing_close_paren() {
        let error = parse_str("(1+2;").unwrap_err();

        assert_eq!(error.location().offset(), 4);
        assert!(matches!(
            error.val(),
            ParserError::UnexpectedToken(Token::Punct(Punct::CloseParen), _)
        ));
    }

    #[test]
    fn missing_operand() {
        let error = parse_str("1+;").unwrap_err();

        assert_eq!(error.location().offset(), 2);
        assert!(matches!(
            error.val(),
            ParserError::ExpectedExpr(Token::Punct(Punct::Semicolon))
        ));
    }

    #[test]
    fn adjacent_identifiers() {
        let error = parse_str("ab;").unwrap_err();

        assert_eq!(error.location().offset(), 1);
        assert!(matches!(
            error.val(),
            ParserError::UnexpectedToken(_, Token::Id('b'))
        ));
    }

    #[test]
    fn only_variables_are_assignable() {
        let error = parse_str("1=2;").unwrap_err();
        assert_eq!(error.location().offset(), 1);
        assert!(matches!(error.val(), ParserError::InvalidTarget));

        let error = parse_str("a+b=2;").unwrap_err();
        assert_eq!(error.location().offset(), 3);
    }

    #[test]
    fn stray_close_paren() {
        let error = parse_str("1;);").unwrap_err();
        assert_eq!(error.location().offset(), 2);
        assert!(matches!(error.val(), ParserError::ExpectedExpr(_)));
    }
}
