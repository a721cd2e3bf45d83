mod options;
mod session;

use std::env;
use std::io::{self, Write};
use std::process;

use options::{USAGE, parse_options};
use session::Session;

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdout = io::stdout();
    let mut writer = stdout.lock();

    if options.show_help {
        writeln!(writer, "{USAGE}")?;
        return Ok(());
    }

    let mut session = Session::new(&options)?;
    writeln!(
        writer,
        "ESC noise emulator (seed {}). Simulating {} iteration(s){}.",
        session.seed(),
        options.config.iterations,
        if options.realtime { " in real time" } else { "" }
    )?;

    let summary = session.run(&mut writer)?;
    writeln!(writer, "{summary}")?;
    Ok(())
}
