//! Construcción de ejecutables.
//!
//! Una vez que se ha emitido código ensamblador, este puede ser
//! ensamblado y enlazado para producir un binario ejecutable cuyo
//! código de salida es el valor de la última sentencia. Ambas
//! operaciones se delegan al compilador de C del sistema.

use std::{
    ffi::OsString,
    io::BufWriter,
    path::Path,
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
};

use bitflags::bitflags;
use thiserror::Error;

/// Comando de enlazado si no se indica otro en `CC`.
const DEFAULT_CC: &str = "cc";

bitflags! {
    /// Opciones a aplicar durante el enlazado.
    pub struct LinkOptions: u32 {
        /// Remover símbolos de depuración del ejecutable final.
        const STRIP = 0x01;
    }
}

/// Un error de ensamblado o enlazado.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LinkerError {
    /// Ocurrió un evento de error de E/S durante la invocación
    /// de comandos externos.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// El enlazador inició su ejecución, pero falló en enlazar.
    #[error("Linker exited with status code {0:?}")]
    Failed(ExitStatus),

    /// El código emitido es exclusivamente x86-64.
    #[error("Native target is not x86-64")]
    UnsupportedHost,
}

/// Instancia del enlazador para un ejecutable definido.
pub struct Linker {
    child: Child,
    stdin: BufWriter<ChildStdin>,
}

impl Linker {
    /// Inicia una instancia del enlazador.
    ///
    /// El enlazador tratará de emitir un ejecutable y escribirlo a
    /// la ruta indicada por `output`.
    pub fn spawn<O>(output: &O, opts: LinkOptions) -> Result<Self, LinkerError>
    where
        O: AsRef<Path> + ?Sized,
    {
        if !cfg!(target_arch = "x86_64") {
            return Err(LinkerError::UnsupportedHost);
        }

        let cc = std::env::var_os("CC").unwrap_or_else(|| OsString::from(DEFAULT_CC));

        // Para ensamblar el código generado, se hace pipe del
        // mismo al stdin del compilador
        let mut command = Command::new(cc);
        command
            .arg("-o")
            .arg(output.as_ref())
            .args(&["-x", "assembler", "-"])
            .stdin(Stdio::piped());

        if opts.contains(LinkOptions::STRIP) {
            command.arg("-s");
        }

        tracing::debug!(?command, "spawning linker");

        let mut child = command.spawn()?;
        let stdin = match child.stdin.take() {
            Some(stdin) => BufWriter::new(stdin),
            None => {
                let _ = child.kill();
                return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
            }
        };

        Ok(Linker { child, stdin })
    }

    /// Obtiene la entrada estándar del proceso que espera recibir ensamblador.
    ///
    /// Luego de crear una instancia con [`Linker::spawn()`], se debe escribir
    /// código ensamblador en la forma exacta en que fue emitido por
    /// [`crate::target::emit()`].
    pub fn stdin(&mut self) -> &mut BufWriter<ChildStdin> {
        &mut self.stdin
    }

    /// Indica el fin del flujo de código y finaliza el enlazado.
    pub fn finish(mut self) -> Result<(), LinkerError> {
        // Cerrar stdin es lo que indica fin de entrada al ensamblador
        self.stdin.into_inner().map_err(|error| error.into_error())?;

        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(LinkerError::Failed(status))
        }
    }
}
