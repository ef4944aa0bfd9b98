//! JSON lines output
//!
//! One JSON object per event, tagged by `kind`, for downstream tooling that
//! prefers structured input over the line format.

use super::WindowFile;
use crate::error::SinkError;
use crate::sink::Sink;
use calltap_shared::{Call, Return};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonRecord<'a> {
    Call {
        class_name: &'a str,
        method_name: &'a str,
        source_file: Option<&'a str>,
        source_line: Option<u32>,
        wall_clock: f64,
        cpu_clock: f64,
    },
    Return {
        wall_clock: f64,
        cpu_clock: f64,
    },
}

#[derive(Debug, Default)]
pub struct JsonLinesSink {
    file: WindowFile,
}

impl JsonLinesSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&mut self, record: &'static str, value: &JsonRecord<'_>) -> Result<(), SinkError> {
        let writer = self.file.writer(record)?;
        serde_json::to_writer(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl Sink for JsonLinesSink {
    fn start(&mut self, output_target: &str) -> Result<(), SinkError> {
        self.file.open(output_target)
    }

    fn call(&mut self, call: &Call) -> Result<(), SinkError> {
        self.write(
            "call",
            &JsonRecord::Call {
                class_name: &call.class_name,
                method_name: &call.method_name,
                source_file: call.source_file.as_deref(),
                source_line: call.source_line,
                wall_clock: call.wall_clock,
                cpu_clock: call.cpu_clock,
            },
        )
    }

    fn ret(&mut self, ret: &Return) -> Result<(), SinkError> {
        self.write(
            "return",
            &JsonRecord::Return {
                wall_clock: ret.wall_clock,
                cpu_clock: ret.cpu_clock,
            },
        )
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        self.file.close()
    }
}
