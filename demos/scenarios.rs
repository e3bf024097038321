use fundep::{Config, Dependency, Table, Tane};
use std::fmt;

fn fmt_dependency<W: fmt::Write>(out: &mut W, dep: &Dependency<u8>) -> fmt::Result {
    for attribute in dep.lhs.iter() {
        out.write_char((b'A' + attribute).into())?;
    }
    out.write_str(" -> ")?;
    out.write_char((b'A' + dep.rhs).into())?;
    if !dep.exact {
        write!(out, "  (error {:.4})", dep.error)?;
    }
    Ok(())
}

fn main() -> fmt::Result {
    let epsilon = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);

    let rows: &[&[&str]] = &[
        &["1", "x", "p", "u"],
        &["1", "x", "q", "v"],
        &["2", "y", "p", "u"],
        &["2", "y", "p", "v"],
        &["3", "x", "q", "u"],
    ];
    let mut table = Table::new(&[0u8, 1, 2, 3]).unwrap();
    for row in rows {
        table.push_row(row).unwrap();
    }

    let config = Config {
        epsilon,
        ..Config::default()
    };
    let report = Tane::with_config(&table, config).run();

    let mut line = String::new();
    for dep in report.iter() {
        line.clear();
        fmt_dependency(&mut line, dep)?;
        println!("{}", line);
    }
    println!("// {} dependencies at epsilon {}", report.len(), epsilon);
    Ok(())
}
