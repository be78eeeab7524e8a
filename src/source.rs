//! Rastreo de ubicaciones originales en código fuente.
//!
//! Los distintos objetos internos que el compilador construye
//! deben llevar cuenta de rangos de ubicaciones en el código fuente
//! original, lo cual permite determinar un punto exacto en donde
//! ocurre un error. Internamente una ubicación es un rango de bytes;
//! las posiciones línea-columna se resuelven únicamente al reportar.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Un objeto cualquiera con una posición original asociada.
#[derive(Debug, Clone)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    /// Obtiene el valor.
    pub fn val(&self) -> &T {
        &self.value
    }

    /// Obtiene la ubicación.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Descarta la ubicación y toma ownership del valor.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Descompone y toma ownership de las dos partes.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Construye a partir de un valor y una ubicación.
    pub fn at(value: T, location: Location) -> Self {
        Located { value, location }
    }

    /// Transforma el valor con la misma ubicación.
    pub fn map<U, F>(self, map: F) -> Located<U>
    where
        F: FnOnce(T) -> U,
    {
        Located {
            value: map(self.value),
            location: self.location,
        }
    }
}

impl<T> AsRef<T> for Located<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

/// Programa fuente completo junto a su nombre de origen.
///
/// El compilador consume la totalidad de la entrada de una sola vez,
/// por lo cual no hay histórico incremental de líneas como en un
/// lector de flujo.
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    /// Construye un origen compartido.
    pub fn new<N, T>(name: N, text: T) -> Rc<Self>
    where
        N: Into<String>,
        T: Into<String>,
    {
        Rc::new(Source {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Nombre con el que se reporta este origen.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texto original.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Invoca a `callback` con el contenido de la línea indicada, sin
    /// terminador. Líneas fuera de rango se observan como vacías.
    pub fn with_line<F, R>(&self, line_number: u32, callback: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let line = self
            .text
            .split('\n')
            .nth(line_number.saturating_sub(1) as usize)
            .unwrap_or("");

        callback(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Resuelve un desplazamiento en bytes a una posición línea-columna.
    ///
    /// Las columnas se cuentan en caracteres, no en bytes.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let before = &self.text[..offset];

        let line_start = before.rfind('\n').map_or(0, |newline| newline + 1);
        let line = before.matches('\n').count() as u32 + 1;
        let column = before[line_start..].chars().count() as u32 + 1;

        Position { line, column }
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Source").field(&self.name).finish()
    }
}

/// Una ubicación está conformada por un origen y un rango de bytes.
///
/// El rango puede ser vacío, como ocurre con el marcador de fin
/// de entrada.
#[derive(Clone)]
pub struct Location {
    from: Rc<Source>,
    span: Range<usize>,
}

impl Location {
    /// Construye una ubicación de `len` bytes a partir de `offset`.
    pub fn new(from: &Rc<Source>, offset: usize, len: usize) -> Self {
        Location {
            from: Rc::clone(from),
            span: offset..offset + len,
        }
    }

    /// Ubicación vacía al final del origen.
    pub fn eof(from: &Rc<Source>) -> Self {
        Location::new(from, from.text.len(), 0)
    }

    /// Unifica un rango de ubicaciones. Se asume el mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            from: from.from,
            span: from.span.start..to.span.end,
        }
    }

    /// Origen de esta ubicación.
    pub fn source(&self) -> &Rc<Source> {
        &self.from
    }

    /// Desplazamiento en bytes del inicio.
    pub fn offset(&self) -> usize {
        self.span.start
    }

    /// Longitud en bytes.
    pub fn len(&self) -> usize {
        self.span.end - self.span.start
    }

    /// Determina si el rango es vacío.
    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// Texto original cubierto por esta ubicación.
    pub fn text(&self) -> &str {
        &self.from.text[self.span.clone()]
    }

    /// Obtiene la posición de inicio.
    pub fn start(&self) -> Position {
        self.from.position(self.span.start)
    }

    /// Obtiene la posición del último carácter incluido, o la de
    /// inicio si el rango es vacío.
    pub fn end(&self) -> Position {
        match self.text().char_indices().last() {
            Some((last, _)) => self.from.position(self.span.start + last),
            None => self.start(),
        }
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:", self.from.name)?;

        let (start, end) = (self.start(), self.end());
        if start == end {
            // Solo se señala una columna en específico
            write!(formatter, "{}", start)
        } else {
            write!(formatter, "[{}-{}]", start, end)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        <Self as Display>::fmt(self, formatter)
    }
}

/// Una posición línea-columna en un archivo.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Position {
    line: u32,
    column: u32,
}

impl Position {
    /// Obtiene el número de línea.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Obtiene el número de columna.
    pub fn column(&self) -> u32 {
        self.column
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}
