//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone el texto fuente
//! en unidades léxicas denominadas tokens. Los espacios en blanco se
//! descartan durante esta operación. Cada token emitido está asociado
//! a una ubicación en el código fuente original, lo cual permite
//! rastrear errores en fases posteriores.
//!
//! # Contenido de un token
//! Operadores y puntuación se identifican por lo que son y no incluyen
//! lexemas. Las constantes literales se resuelven a sus valores. Los
//! identificadores constan de exactamente una letra minúscula, por lo
//! cual se representan como un único `char`.
//!
//! # Errores
//! A diferencia de fases más elaboradas, el lexer no se recupera de
//! errores: el primer carácter inesperado termina el análisis.

use crate::source::{Located, Location, Source};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::CharIndices,
};

use thiserror::Error;

/// Literal entero máximo.
///
/// Las constantes se emiten como operandos inmediatos de `push`,
/// los cuales en x86-64 son de 32 bits con extensión de signo.
pub const INT_MAX: i32 = i32::MAX;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Unrecognized character {0:?}")]
    BadChar(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,
}

/// Objeto resultante del análisis léxico.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Identificador de una sola letra.
    Id(char),

    /// Literal de entero.
    IntLiteral(i32),

    /// Operador o signo de puntuación.
    Punct(Punct),

    /// Fin de la entrada. Siempre es el último token.
    Eof,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Id(id) => write!(fmt, "identifier `{}`", id),
            Token::IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            Token::Punct(punct) => write!(fmt, "`{}`", punct),
            Token::Eof => fmt.write_str("end of input"),
        }
    }
}

/// Operadores y puntuación.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Slash,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `;`
    Semicolon,

    /// `=`
    Assign,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,
}

impl Punct {
    /// Lexema original.
    pub fn as_str(self) -> &'static str {
        use Punct::*;

        match self {
            Plus => "+",
            Minus => "-",
            Times => "*",
            Slash => "/",
            OpenParen => "(",
            CloseParen => ")",
            Semicolon => ";",
            Assign => "=",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessOrEqual => "<=",
            Greater => ">",
            GreaterOrEqual => ">=",
        }
    }
}

impl Display for Punct {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Reduce la totalidad de la entrada a una secuencia de tokens
/// terminada en [`Token::Eof`], o al primer error encontrado.
pub fn tokenize(source: &Rc<Source>) -> Result<Vec<Located<Token>>, Located<LexerError>> {
    let tokens = Lexer::new(source).collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(count = tokens.len(), "tokenized {}", source.name());

    Ok(tokens)
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en la entrada.
pub struct Lexer<'a> {
    source: &'a Rc<Source>,
    chars: Peekable<CharIndices<'a>>,
    state: State,
    start: usize,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de completitud; siempre emite el token incluido
    /// sin consumir más entrada y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró uno de `=`, `!`, `<` o `>`, los cuales pueden
    /// formar un operador de dos caracteres si les sigue `=`.
    Compare(char),

    /// Constante entera.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(i32),

    /// Se emitió [`Token::Eof`] o un error; no hay más salida.
    Done,
}

impl<'a> Lexer<'a> {
    /// Crea un lexer en estado inicial.
    pub fn new(source: &'a Rc<Source>) -> Self {
        Lexer {
            source,
            chars: source.text().char_indices().peekable(),
            state: State::Start,
            start: 0,
        }
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use State::*;

        loop {
            let next_char = self.chars.peek().copied();

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let Start = self.state {
                self.start = next_char.map_or(self.source.text().len(), |(offset, _)| offset);
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char.map(|(_, c)| c)) {
                (Done, _) => return Ok(None),

                // Fin de la entrada
                (Start, None) => {
                    self.state = Done;
                    return Ok(Some(Token::Eof));
                }

                // Tokens triviales
                (Start, Some('+')) => self.state = Complete(Token::Punct(Punct::Plus)),
                (Start, Some('-')) => self.state = Complete(Token::Punct(Punct::Minus)),
                (Start, Some('*')) => self.state = Complete(Token::Punct(Punct::Times)),
                (Start, Some('/')) => self.state = Complete(Token::Punct(Punct::Slash)),
                (Start, Some('(')) => self.state = Complete(Token::Punct(Punct::OpenParen)),
                (Start, Some(')')) => self.state = Complete(Token::Punct(Punct::CloseParen)),
                (Start, Some(';')) => self.state = Complete(Token::Punct(Punct::Semicolon)),

                (Start, Some(c @ ('=' | '!' | '<' | '>'))) => self.state = Compare(c),

                (Start, Some(c)) if c.is_ascii_lowercase() => self.state = Complete(Token::Id(c)),

                // Inicio de una constante numérica. No se consume
                // el dígito, ya que esta lógica ya está implementada
                // en el caso de un estado de constante entera para el
                // cual el siguiente carácter es un dígito.
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(token), _) => return Ok(Some(*token)),

                // Operadores de dos caracteres tienen prioridad
                (Compare(first), Some('=')) => {
                    let punct = match first {
                        '=' => Punct::Equal,
                        '!' => Punct::NotEqual,
                        '<' => Punct::LessOrEqual,
                        _ => Punct::GreaterOrEqual,
                    };

                    self.state = Complete(Token::Punct(punct));
                }

                (Compare(first), _) => {
                    return match first {
                        '=' => Ok(Some(Token::Punct(Punct::Assign))),
                        '<' => Ok(Some(Token::Punct(Punct::Less))),
                        '>' => Ok(Some(Token::Punct(Punct::Greater))),
                        c => Err(LexerError::BadChar(*c)),
                    };
                }

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = (digit as u8 - b'0') as i32;

                    match accumulated
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit))
                    {
                        Some(result) => *accumulated = result,
                        None => return Err(LexerError::IntOverflow),
                    }
                }

                // Si sigue algo que no es un dígito, la constante ha terminado
                (Integer(integer), _) => return Ok(Some(Token::IntLiteral(*integer))),
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            self.chars.next();
        }
    }

    /// Desplazamiento del siguiente carácter no consumido.
    fn cursor(&mut self) -> usize {
        let end = self.source.text().len();
        self.chars.peek().map_or(end, |&(offset, _)| offset)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,

            Ok(Some(token)) => {
                if !matches!(self.state, State::Done) {
                    self.state = State::Start;
                }

                let len = self.cursor() - self.start;
                let location = Location::new(self.source, self.start, len);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                let location = match error {
                    // Se señala el carácter ofensivo, que todavía no se ha consumido
                    LexerError::BadChar(c) => {
                        let offset = match self.state {
                            State::Compare(_) => self.start,
                            _ => self.cursor(),
                        };

                        Location::new(self.source, offset, c.len_utf8())
                    }

                    LexerError::IntOverflow => {
                        let len = self.cursor() - self.start;
                        Location::new(self.source, self.start, len + 1)
                    }
                };

                self.state = State::Done;
                Some(Err(Located::at(error, location)))
            }
        }
    }
}
