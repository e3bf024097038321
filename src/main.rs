use csv_core::{ReadFieldResult, ReaderBuilder};
use fundep::{Config, Table, Tane};
use lasso::{Key, MiniSpur, Rodeo, RodeoResolver, Spur};
use std::io;
use std::str;

/// Reads a CSV table from `input`. The first record names the attributes;
/// every later record is a row of values. Attribute names are interned so
/// the search works on compact ids, and values are interned to integer
/// codes because dependency discovery only ever compares them for
/// equality. Empty fields are nulls: by default they all share one code,
/// with `nulls_distinct` each gets a fresh code no real value can collide
/// with.
fn load_table<I: io::Read>(
    mut input: I,
    nulls_distinct: bool,
) -> io::Result<(RodeoResolver<MiniSpur>, Table<MiniSpur, u64>)> {
    let mut inputbuf = [0; 16384];
    let mut fieldbuf = [0; 1024];
    let mut fieldlen = 0;
    let mut header = Vec::new();
    let mut record = Vec::new();
    let mut table: Option<Table<MiniSpur, u64>> = None;
    let mut names: Rodeo<MiniSpur> = Rodeo::new();
    let mut values: Rodeo<Spur> = Rodeo::new();
    let mut nulls_seen: u64 = 0;
    let mut csv = ReaderBuilder::new().build();

    loop {
        let read = input.read(&mut inputbuf)?;
        let mut bytes = &inputbuf[..read];
        loop {
            let (result, nin, nout) = csv.read_field(bytes, &mut fieldbuf[fieldlen..]);
            bytes = &bytes[nin..];
            fieldlen += nout;
            match result {
                ReadFieldResult::InputEmpty => break,
                ReadFieldResult::OutputFull => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("field too long on line {}", csv.line()),
                    ));
                }
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&fieldbuf[..fieldlen])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    fieldlen = 0;

                    if table.is_none() {
                        header.push(names.get_or_intern(field));
                    } else if field.is_empty() {
                        record.push(if nulls_distinct {
                            nulls_seen += 1;
                            u64::MAX - nulls_seen
                        } else {
                            u64::MAX
                        });
                    } else {
                        record.push(unsafe { values.get_or_intern(field).into_usize() } as u64);
                    }

                    if record_end {
                        if let Some(table) = table.as_mut() {
                            table
                                .push_row(&record)
                                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                            record.clear();
                        } else {
                            // Interning maps duplicate column names to the
                            // same id, which Table::new rejects.
                            table = Some(Table::new(&header).map_err(|e| {
                                io::Error::new(io::ErrorKind::InvalidData, e)
                            })?);
                        }
                    }
                }
                ReadFieldResult::End => {
                    let table = match table {
                        Some(table) => table,
                        None => Table::new(&[])
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                    };
                    return Ok((names.into_resolver(), table));
                }
            }
        }
    }
}

fn usage(arg: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!(
            "unexpected argument {:?}; usage: fundep [epsilon] [max-level] [--nulls-distinct] < data.csv",
            arg
        ),
    )
}

fn main() -> io::Result<()> {
    env_logger::init();

    let mut epsilon = 0.0;
    let mut max_level = None;
    let mut nulls_distinct = false;
    let mut positional = 0;
    for arg in std::env::args().skip(1) {
        if arg == "--nulls-distinct" {
            nulls_distinct = true;
            continue;
        }
        match positional {
            0 => epsilon = arg.parse().map_err(|_| usage(&arg))?,
            1 => max_level = Some(arg.parse().map_err(|_| usage(&arg))?),
            _ => return Err(usage(&arg)),
        }
        positional += 1;
    }

    let (resolver, table) = load_table(io::stdin().lock(), nulls_distinct)?;
    log::info!(
        "loaded {} rows over {} attributes",
        table.row_count(),
        table.attributes().len()
    );

    let config = Config {
        epsilon,
        max_level,
        ..Config::default()
    };
    let report = Tane::with_config(&table, config).run();

    for dep in report.iter() {
        let mut lhs = String::new();
        for (i, attribute) in dep.lhs.iter().enumerate() {
            if i > 0 {
                lhs.push(',');
            }
            lhs.push_str(resolver.resolve(&attribute));
        }
        if dep.exact {
            println!("{} -> {}", lhs, resolver.resolve(&dep.rhs));
        } else {
            println!(
                "{} -> {}  (error {:.6})",
                lhs,
                resolver.resolve(&dep.rhs),
                dep.error
            );
        }
    }
    println!(
        "# {} dependencies{}",
        report.len(),
        if report.truncated() {
            ", search truncated"
        } else {
            ""
        }
    );
    Ok(())
}
