//! Reporte de errores con contexto de código fuente.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Errores listos para mostrarse al usuario.
pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Ubicaciones de los errores, en orden de reporte.
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.errors.iter().map(|error| error.location())
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            writeln!(fmt, "{}: {}", kind, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let (start, end) = (location.start(), location.end());
            let digits = end.line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            location.source().with_line(start.line(), |line| {
                writeln!(fmt, "{:>digits$} | {}", start.line(), line, digits = digits)?;

                // Se replican los tabuladores de la línea original para que
                // el marcador quede alineado sin importar su ancho visual
                let skip: String = line
                    .chars()
                    .take(start.column() as usize - 1)
                    .map(|c| if c == '\t' { '\t' } else { ' ' })
                    .collect();

                // Un rango vacío (fin de entrada) se marca con un solo carácter;
                // un rango de varias líneas se marca hasta el fin de la primera
                let highlight = if end.line() == start.line() {
                    (end.column() - start.column() + 1) as usize
                } else {
                    line.chars().count().saturating_sub(skip.chars().count()).max(1)
                };

                writeln!(
                    fmt,
                    "{:digits$} | {}{:^<highlight$}",
                    "",
                    skip,
                    "",
                    digits = digits,
                    highlight = highlight
                )
            })?;

            writeln!(fmt)?;
        }

        let error_or_errors = if errors.len() == 1 { "error" } else { "errors" };
        writeln!(
            fmt,
            "Build failed with {} {}",
            errors.len(),
            error_or_errors
        )
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}
