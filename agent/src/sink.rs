//! Consumers of the observed event stream

use crate::error::SinkError;
use calltap_shared::{Call, Event, Return};

/// Receives trace events inside the observer process.
///
/// Callbacks run synchronously and in delivery order. A returned error ends
/// the observer's receive loop.
pub trait Sink {
    /// A trace window opened; output should go to `output_target`
    fn start(&mut self, output_target: &str) -> Result<(), SinkError>;

    fn call(&mut self, call: &Call) -> Result<(), SinkError>;

    fn ret(&mut self, ret: &Return) -> Result<(), SinkError>;

    /// The current trace window closed
    fn stop(&mut self) -> Result<(), SinkError>;

    fn event(&mut self, event: &Event) -> Result<(), SinkError> {
        match event {
            Event::Call(call) => self.call(call),
            Event::Return(ret) => self.ret(ret),
        }
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn start(&mut self, output_target: &str) -> Result<(), SinkError> {
        (**self).start(output_target)
    }

    fn call(&mut self, call: &Call) -> Result<(), SinkError> {
        (**self).call(call)
    }

    fn ret(&mut self, ret: &Return) -> Result<(), SinkError> {
        (**self).ret(ret)
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        (**self).stop()
    }
}

/// Accepts and discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl Sink for NullSink {
    fn start(&mut self, _output_target: &str) -> Result<(), SinkError> {
        Ok(())
    }

    fn call(&mut self, _call: &Call) -> Result<(), SinkError> {
        Ok(())
    }

    fn ret(&mut self, _ret: &Return) -> Result<(), SinkError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltap_shared::Timestamps;

    #[derive(Default)]
    struct Counting {
        calls: usize,
        returns: usize,
    }

    impl Sink for Counting {
        fn start(&mut self, _output_target: &str) -> Result<(), SinkError> {
            Ok(())
        }
        fn call(&mut self, _call: &Call) -> Result<(), SinkError> {
            self.calls += 1;
            Ok(())
        }
        fn ret(&mut self, _ret: &Return) -> Result<(), SinkError> {
            self.returns += 1;
            Ok(())
        }
        fn stop(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[test]
    fn test_event_dispatches_by_kind() {
        let stamp = Timestamps::new(1.0, 0.5);
        let mut sink = Counting::default();
        sink.event(&Event::Call(Call::new("String", "strip", None, None, stamp)))
            .unwrap();
        sink.event(&Event::Return(Return::new(stamp))).unwrap();
        sink.event(&Event::Return(Return::new(stamp))).unwrap();
        assert_eq!((sink.calls, sink.returns), (1, 2));
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let mut sink: Box<dyn Sink> = Box::new(NullSink);
        sink.start("unused").unwrap();
        sink.ret(&Return::new(Timestamps::new(0.0, 0.0))).unwrap();
        sink.stop().unwrap();
    }
}
