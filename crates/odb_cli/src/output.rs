//! Output sinks: standard output, or a viewer process reading our output.

use crate::options::Options;
use std::env;
use std::ffi::OsString;
use std::io::{self, BufWriter, Write};
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// A process that displays output on the terminal.
#[derive(Debug, Clone)]
pub enum Viewer {
    /// `$PAGER`, or `less`.
    Pager,
    /// The PostgreSQL client.
    Psql,
    /// `odb print`, for binary output.
    Printer(Vec<OsString>),
}

impl Viewer {
    fn command(&self) -> io::Result<Command> {
        Ok(match self {
            Viewer::Pager => Command::new(env::var_os("PAGER").unwrap_or_else(|| "less".into())),
            Viewer::Psql => Command::new("psql"),
            Viewer::Printer(args) => {
                let mut command = Command::new(env::current_exe()?);
                command.args(args);
                command
            }
        })
    }
}

/// Where a command writes its output.
pub struct Output {
    sink: Box<dyn Write>,
    child: Option<Child>,
}

impl Output {
    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self {
            sink: Box::new(BufWriter::new(io::stdout().lock())),
            child: None,
        }
    }

    /// Writes to the standard input of `viewer`.
    pub fn spawn(viewer: &Viewer) -> io::Result<Self> {
        let mut command = viewer.command()?;
        debug!(program = ?command.get_program(), "starting viewer");
        let mut child = command.stdin(Stdio::piped()).spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "viewer has no stdin"))?;
        Ok(Self {
            sink: Box::new(BufWriter::new(stdin)),
            child: Some(child),
        })
    }

    /// Output for ODB records: piped through `odb print` on a terminal.
    pub fn binary(options: &Options) -> io::Result<Self> {
        if options.is_tty() {
            Self::spawn(&Viewer::Printer(options.print_args()))
        } else {
            Ok(Self::stdout())
        }
    }

    /// Output for text: piped through `viewer` on a terminal.
    pub fn text(options: &Options, viewer: Viewer) -> io::Result<Self> {
        if options.is_tty() {
            Self::spawn(&viewer)
        } else {
            Ok(Self::stdout())
        }
    }

    pub fn writer(&mut self) -> &mut dyn Write {
        &mut *self.sink
    }

    /// Flushes the output and waits for the viewer to exit.
    ///
    /// A viewer that quit early (closing the pipe) is not an error.
    pub fn finish(self) -> io::Result<()> {
        let Self { mut sink, child } = self;
        let flushed = sink.flush();
        drop(sink);
        if let Some(mut child) = child {
            let status = child.wait()?;
            debug!(%status, "viewer exited");
        }
        match flushed {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    }
}
