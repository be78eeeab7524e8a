//! Ensambla, enlaza y ejecuta programas, comparando su código de salida
//! contra el evaluador de referencia. Requiere un host x86-64 Linux con
//! un compilador de C; en otro caso las pruebas no hacen nada.

use std::{
    io::Write,
    path::PathBuf,
    process::Command,
    sync::atomic::{AtomicUsize, Ordering},
};

use minicc::{
    frontend,
    link::{LinkOptions, Linker},
    source::Source,
    target::{self, Syntax},
};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn scratch_path() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("minicc-rt-{}-{}", std::process::id(), id))
}

/// Compila y ejecuta, devolviendo el código de salida del proceso.
fn build_and_run(text: &str, syntax: Syntax) -> Result<i32, String> {
    let source = Source::new("<test>", text);
    let ast = frontend(&source).map_err(|diagnostics| diagnostics.to_string())?;

    let mut asm = Vec::new();
    target::emit(&ast, syntax, &mut asm).map_err(|error| error.to_string())?;

    let path = scratch_path();
    let result = (|| {
        let mut linker = Linker::spawn(&path, LinkOptions::empty()).map_err(|e| e.to_string())?;
        linker.stdin().write_all(&asm).map_err(|e| e.to_string())?;
        linker.finish().map_err(|e| e.to_string())?;

        let status = Command::new(&path).status().map_err(|e| e.to_string())?;
        status.code().ok_or_else(|| format!("{:?} terminated by signal", path))
    })();

    let _ = std::fs::remove_file(&path);
    result
}

/// Determina si el host puede ensamblar y ejecutar lo que se emite.
fn toolchain_available() -> bool {
    if !cfg!(all(target_arch = "x86_64", target_os = "linux")) {
        return false;
    }

    match build_and_run("0;", Syntax::Intel) {
        Ok(0) => true,
        Ok(code) => panic!("trivial program exited with {}", code),
        Err(error) => {
            eprintln!("skipping: no usable toolchain ({})", error);
            false
        }
    }
}

fn check(programs: &[&str]) {
    if !toolchain_available() {
        return;
    }

    for text in programs {
        let source = Source::new("<test>", *text);
        let ast = frontend(&source).unwrap_or_else(|diagnostics| panic!("{}", diagnostics));
        let expected = ast.evaluate().unwrap().rem_euclid(256) as i32;

        for syntax in [Syntax::Intel, Syntax::Att] {
            let actual = build_and_run(text, syntax).unwrap();
            assert_eq!(actual, expected, "{:?} in {} syntax", text, syntax);
        }
    }
}

#[test]
fn arithmetic() {
    check(&[
        "42;",
        "1+2*3;",
        "(1+2)*3;",
        "8-3-2;",
        "100/7;",
        "-3*-4;",
        "-1;",
        "2147483647*2;",
    ]);
}

#[test]
fn comparisons() {
    check(&[
        "1<2;", "2<1;", "2<=2;", "3<=2;", "3>2;", "2>3;", "2>=2;", "1>=2;", "4==4;", "4!=4;",
        "4!=5;",
    ]);
}

#[test]
fn variables_and_sequencing() {
    check(&[
        "a=3;b=4;a+b;",
        "a=3;a=5;a;",
        "1;2;3;",
        "a=b=c=7; a+b+c;",
        "z=1; y=z+1; x=y*y; w=x-z; w*10+y;",
        "",
    ]);
}
