//! Default line-format sink
//!
//! Writes the `call:` / `return:` record format read back by
//! `calltap_shared::parse_trace`.

use super::WindowFile;
use crate::error::SinkError;
use crate::sink::Sink;
use calltap_shared::{render_call, render_return, Call, Return};
use std::io::Write;

#[derive(Debug, Default)]
pub struct LineSink {
    file: WindowFile,
}

impl LineSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for LineSink {
    fn start(&mut self, output_target: &str) -> Result<(), SinkError> {
        self.file.open(output_target)
    }

    fn call(&mut self, call: &Call) -> Result<(), SinkError> {
        writeln!(self.file.writer("call")?, "{}", render_call(call))?;
        Ok(())
    }

    fn ret(&mut self, ret: &Return) -> Result<(), SinkError> {
        writeln!(self.file.writer("return")?, "{}", render_return(ret))?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        self.file.close()
    }
}
