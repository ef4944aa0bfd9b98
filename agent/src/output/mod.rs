//! File sinks shipped with the agent
//!
//! Both sinks open their output when a trace window starts and flush and
//! close it when the window stops.

pub mod json;
pub mod lines;

pub use json::JsonLinesSink;
pub use lines::LineSink;

use crate::error::SinkError;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Output file of the currently open trace window
#[derive(Debug, Default)]
struct WindowFile {
    open: Option<(String, BufWriter<File>)>,
}

impl WindowFile {
    fn open(&mut self, output_target: &str) -> Result<(), SinkError> {
        if let Some((current, _)) = &self.open {
            return Err(SinkError::AlreadyStarted(current.clone()));
        }
        let file = File::create(output_target).map_err(|source| SinkError::Open {
            target: output_target.to_string(),
            source,
        })?;
        self.open = Some((output_target.to_string(), BufWriter::new(file)));
        Ok(())
    }

    fn writer(&mut self, record: &'static str) -> Result<&mut BufWriter<File>, SinkError> {
        match &mut self.open {
            Some((_, writer)) => Ok(writer),
            None => Err(SinkError::NotStarted(record)),
        }
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let (_, mut writer) = self.open.take().ok_or(SinkError::NotStarted("stop"))?;
        writer.flush()?;
        Ok(())
    }
}
